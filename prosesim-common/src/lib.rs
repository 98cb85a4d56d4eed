//! Common types and utilities for prosesim
//!
//! This crate provides shared types, configuration structures, and utilities
//! used across all prosesim crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod transport;

pub use config::{
    DeviceConfig, DeviceRole, DiscoveryModel, ProseConfig, SelectionAlgorithm,
};
pub use error::Error;
pub use logging::{init_logging, init_logging_with_filter, LogLevel};
pub use transport::UdpTransport;
