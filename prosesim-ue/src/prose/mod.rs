//! ProSe Layer (Rel-17 sidelink relay service)
//!
//! Implements relay discovery, relay (re)selection, and ProSe direct-link
//! management for a single device:
//!
//! - [`filter`]: RSRP exponential filtering and eligibility with hysteresis
//! - [`registry`]: table of discovered relay candidates
//! - [`selection`]: relay selection algorithms
//! - [`discovery`]: Model A / Model B discovery engine
//! - [`direct_link`]: the per-peer direct-link state machine
//! - [`task`]: the orchestration actor tying the pieces together
//! - [`stats`]: event-fed relay statistics collector
//!
//! # 3GPP Reference
//!
//! - TS 23.304: Proximity-based Services (ProSe)
//! - TS 24.554: ProSe PC5 signalling protocol

pub mod direct_link;
pub mod discovery;
pub mod filter;
pub mod registry;
pub mod selection;
pub mod stats;
pub mod task;

pub use direct_link::{DirectLink, DirectLinkConfig, DirectLinkRole, DirectLinkState, LinkAction};
pub use discovery::{DiscoveryEngine, DiscoveryOutcome};
pub use filter::{RsrpFilter, RsrpFilterConfig};
pub use registry::{ObservationOutcome, RelayCandidate, RelayRegistry};
pub use selection::{RelayInfo, RelaySelectionAlgorithm};
pub use stats::RelayStats;
pub use task::ProseTask;

/// Discrete observability events emitted by the ProSe layer.
///
/// Consumed by the scenario harness for logging and statistics; emission
/// never blocks the core.
#[derive(Debug, Clone, PartialEq)]
pub enum ProseEvent {
    /// A relay was discovered for the first time
    RelayDiscovered {
        /// L2 identifier of the observing remote
        remote_l2_id: u32,
        /// L2 identifier of the discovered relay
        relay_l2_id: u32,
        /// Relay service code advertised
        relay_code: u32,
        /// Filtered RSRP after the first sample
        rsrp_dbm: f64,
    },
    /// A known relay's filtered RSRP was updated
    RelayRsrpUpdated {
        /// L2 identifier of the observing remote
        remote_l2_id: u32,
        /// L2 identifier of the relay
        relay_l2_id: u32,
        /// New filtered RSRP
        rsrp_dbm: f64,
    },
    /// The selection algorithm chose a relay different from the current one
    RelaySelected {
        /// L2 identifier of the selecting remote
        remote_l2_id: u32,
        /// Relay currently backing the link, if any
        current_relay_l2_id: Option<u32>,
        /// Newly selected relay
        selected_relay_l2_id: u32,
        /// Relay service code
        relay_code: u32,
        /// Filtered RSRP of the selected relay
        rsrp_dbm: f64,
    },
    /// A direct link changed state
    LinkStateChanged {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the peer
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
        /// Previous state
        old_state: DirectLinkState,
        /// New state
        new_state: DirectLinkState,
    },
    /// A direct link completed establishment
    LinkEstablished {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the peer
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
    /// Establishment failed after exhausting the retransmission budget
    LinkEstablishmentFailed {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the peer
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
    /// A direct link was released (acknowledged or forced)
    LinkReleased {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the peer
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
    /// The data path toward the bearer layer was activated
    DataPathActivated {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the peer
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
    /// The data path toward the bearer layer was deactivated
    DataPathDeactivated {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the peer
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
    /// A message arrived that the current state cannot process
    ///
    /// Duplicate and late messages are expected under loss and
    /// retransmission; they are ignored and reported for diagnostics.
    ProtocolViolation {
        /// L2 identifier of the local device
        local_l2_id: u32,
        /// L2 identifier of the sending peer
        peer_l2_id: u32,
        /// Short description of the ignored message
        detail: &'static str,
    },
}
