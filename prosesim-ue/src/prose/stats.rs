//! Relay Statistics Collector
//!
//! Aggregates the ProSe event stream into typed counters for the scenario
//! harness: discoveries and selections keyed by `(remote, relay, code)`,
//! latest filtered RSRP per `(remote, relay)`, and link/data-path totals.
//! Owned by the consumer side of the event channel; the core never touches
//! it.

use std::collections::HashMap;
use std::fmt;

use super::{DirectLinkState, ProseEvent};

/// Event-fed statistics for relay discovery and selection.
#[derive(Debug, Default)]
pub struct RelayStats {
    discoveries: HashMap<(u32, u32, u32), u64>,
    selections: HashMap<(u32, u32, u32), u64>,
    last_rsrp: HashMap<(u32, u32), f64>,
    link_state_changes: u64,
    links_established: u64,
    links_released: u64,
    establishment_failures: u64,
    data_path_activations: u64,
    protocol_violations: u64,
}

impl RelayStats {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the statistics.
    pub fn record(&mut self, event: &ProseEvent) {
        match event {
            ProseEvent::RelayDiscovered {
                remote_l2_id,
                relay_l2_id,
                relay_code,
                rsrp_dbm,
            } => {
                *self
                    .discoveries
                    .entry((*remote_l2_id, *relay_l2_id, *relay_code))
                    .or_insert(0) += 1;
                self.last_rsrp.insert((*remote_l2_id, *relay_l2_id), *rsrp_dbm);
            }
            ProseEvent::RelayRsrpUpdated {
                remote_l2_id,
                relay_l2_id,
                rsrp_dbm,
            } => {
                self.last_rsrp.insert((*remote_l2_id, *relay_l2_id), *rsrp_dbm);
            }
            ProseEvent::RelaySelected {
                remote_l2_id,
                selected_relay_l2_id,
                relay_code,
                ..
            } => {
                *self
                    .selections
                    .entry((*remote_l2_id, *selected_relay_l2_id, *relay_code))
                    .or_insert(0) += 1;
            }
            ProseEvent::LinkStateChanged { new_state, .. } => {
                self.link_state_changes += 1;
                if *new_state == DirectLinkState::Connected {
                    self.links_established += 1;
                }
            }
            ProseEvent::LinkReleased { .. } => {
                self.links_released += 1;
            }
            ProseEvent::LinkEstablishmentFailed { .. } => {
                self.establishment_failures += 1;
            }
            ProseEvent::DataPathActivated { .. } => {
                self.data_path_activations += 1;
            }
            ProseEvent::ProtocolViolation { .. } => {
                self.protocol_violations += 1;
            }
            ProseEvent::LinkEstablished { .. } | ProseEvent::DataPathDeactivated { .. } => {}
        }
    }

    /// Discovery count for a `(remote, relay, code)` tuple.
    pub fn discoveries(&self, remote_l2_id: u32, relay_l2_id: u32, relay_code: u32) -> u64 {
        self.discoveries
            .get(&(remote_l2_id, relay_l2_id, relay_code))
            .copied()
            .unwrap_or(0)
    }

    /// Selection count for a `(remote, relay, code)` tuple.
    pub fn selections(&self, remote_l2_id: u32, relay_l2_id: u32, relay_code: u32) -> u64 {
        self.selections
            .get(&(remote_l2_id, relay_l2_id, relay_code))
            .copied()
            .unwrap_or(0)
    }

    /// Latest filtered RSRP reported for a `(remote, relay)` pair.
    pub fn last_rsrp(&self, remote_l2_id: u32, relay_l2_id: u32) -> Option<f64> {
        self.last_rsrp.get(&(remote_l2_id, relay_l2_id)).copied()
    }

    /// Number of distinct relays discovered, over all remotes.
    pub fn distinct_relays_discovered(&self) -> usize {
        self.discoveries.len()
    }

    /// Total link state transitions observed.
    pub fn link_state_changes(&self) -> u64 {
        self.link_state_changes
    }

    /// Total links that reached `Connected`.
    pub fn links_established(&self) -> u64 {
        self.links_established
    }

    /// Total links released back to `Idle`.
    pub fn links_released(&self) -> u64 {
        self.links_released
    }

    /// Total establishment failures after retry exhaustion.
    pub fn establishment_failures(&self) -> u64 {
        self.establishment_failures
    }

    /// Total data-path activations.
    pub fn data_path_activations(&self) -> u64 {
        self.data_path_activations
    }

    /// Total ignored messages reported as protocol violations.
    pub fn protocol_violations(&self) -> u64 {
        self.protocol_violations
    }
}

impl fmt::Display for RelayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discoveries[{}] selections[{}] established[{}] released[{}] failures[{}] violations[{}]",
            self.discoveries.values().sum::<u64>(),
            self.selections.values().sum::<u64>(),
            self.links_established,
            self.links_released,
            self.establishment_failures,
            self.protocol_violations,
        )
    }
}
