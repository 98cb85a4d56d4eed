//! Error types for prosesim

use thiserror::Error;

/// Error types for the prosesim library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol-related errors.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network I/O errors.
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// State machine errors.
    #[error("State machine error: {0}")]
    StateMachine(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
