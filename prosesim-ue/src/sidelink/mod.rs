//! Sidelink Transport
//!
//! UDP-based PC5 transport for a device: encodes and decodes PC5-S messages,
//! learns peer addresses from received traffic, and derives the raw RSRP
//! sample for discovery messages from the simulated positions of sender and
//! receiver.

pub mod task;

pub use task::{compute_rsrp_dbm, SidelinkTask, SidelinkTaskConfig, DEFAULT_PC5_PORT};
