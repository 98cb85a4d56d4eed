//! prosesim device runtime
//!
//! This crate provides the device-side implementation of the prosesim
//! sidelink relay simulator. It includes:
//!
//! - Retransmission timers for PC5 signalling procedures
//! - Task framework for async message passing
//! - The ProSe layer: relay discovery, eligibility filtering, relay
//!   (re)selection, and direct-link management
//! - Sidelink transport over UDP with position-derived RSRP
//! - An event-fed relay statistics collector

pub mod prose;
pub mod sidelink;
pub mod tasks;
pub mod timer;

// Re-export ProSe types
pub use prose::{
    DirectLink, DirectLinkConfig, DirectLinkRole, DirectLinkState, DiscoveryEngine,
    DiscoveryOutcome, LinkAction, ObservationOutcome, ProseEvent, ProseTask, RelayCandidate,
    RelayInfo, RelayRegistry, RelaySelectionAlgorithm, RelayStats, RsrpFilter, RsrpFilterConfig,
};

// Re-export sidelink types
pub use sidelink::{compute_rsrp_dbm, SidelinkTask, SidelinkTaskConfig, DEFAULT_PC5_PORT};

// Re-export task types
pub use tasks::{
    BearerMessage, DeviceTaskBase, ProseTaskMessage, SidelinkTaskMessage, Task, TaskHandle,
    TaskId, TaskMessage, DEFAULT_CHANNEL_CAPACITY,
};

// Re-export timer types
pub use timer::{
    ProseTimer, DEFAULT_T5080_INTERVAL, DEFAULT_T5087_INTERVAL, TIMER_T5080, TIMER_T5087,
};
