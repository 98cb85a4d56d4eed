//! Relay Candidate Registry
//!
//! Per-remote table of discovered relay devices. Entries are keyed by
//! `(l2_id, relay_code)` and kept in discovery order, which the
//! first-available selection algorithm depends on. Every observation runs
//! through the candidate's RSRP filter; raw samples are never stored.
//!
//! Entries persist indefinitely by default; an optional expiry window prunes
//! candidates that have not been refreshed.

use std::time::{Duration, Instant};

use super::filter::{RsrpFilter, RsrpFilterConfig};

/// A discovered relay as seen by one remote device.
#[derive(Debug, Clone)]
pub struct RelayCandidate {
    /// L2 identifier of the relay
    pub l2_id: u32,
    /// Relay service code advertised by the relay
    pub relay_code: u32,
    /// Time of the most recent observation
    pub last_seen: Instant,
    filter: RsrpFilter,
}

impl RelayCandidate {
    /// Returns the filtered RSRP of this candidate.
    pub fn rsrp_dbm(&self) -> f64 {
        // An entry is only created through an observation, so the filter
        // always holds a value.
        self.filter.filtered().unwrap_or(f64::NEG_INFINITY)
    }

    /// Returns the current eligibility of this candidate.
    pub fn eligible(&self) -> bool {
        self.filter.eligible()
    }
}

/// Result of feeding one discovery observation into the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationOutcome {
    /// True if this observation created the entry
    pub is_new: bool,
    /// True if the observation flipped the candidate's eligibility
    pub eligibility_changed: bool,
    /// Filtered RSRP after the observation
    pub rsrp_dbm: f64,
    /// Eligibility after the observation
    pub eligible: bool,
}

impl ObservationOutcome {
    /// True if the registry changed materially, i.e. relay selection should
    /// be re-evaluated.
    pub fn is_material(&self) -> bool {
        self.is_new || self.eligibility_changed
    }
}

/// Table of discovered relay candidates, in discovery order.
#[derive(Debug)]
pub struct RelayRegistry {
    entries: Vec<RelayCandidate>,
    filter_config: RsrpFilterConfig,
    expiry: Option<Duration>,
}

impl RelayRegistry {
    /// Creates an empty registry.
    ///
    /// `expiry` of None keeps entries forever once discovered.
    pub fn new(filter_config: RsrpFilterConfig, expiry: Option<Duration>) -> Self {
        Self {
            entries: Vec::new(),
            filter_config,
            expiry,
        }
    }

    /// Records a discovery observation for `(l2_id, relay_code)`.
    ///
    /// Creates the entry on first observation, otherwise re-runs the filter
    /// with the new sample and refreshes the observation time.
    pub fn observe(&mut self, l2_id: u32, relay_code: u32, raw_rsrp_dbm: f64) -> ObservationOutcome {
        let now = Instant::now();

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.l2_id == l2_id && e.relay_code == relay_code)
        {
            let was_eligible = entry.filter.eligible();
            let (rsrp_dbm, eligible) = entry.filter.update(raw_rsrp_dbm);
            entry.last_seen = now;
            return ObservationOutcome {
                is_new: false,
                eligibility_changed: eligible != was_eligible,
                rsrp_dbm,
                eligible,
            };
        }

        let mut filter = RsrpFilter::new(self.filter_config);
        let (rsrp_dbm, eligible) = filter.update(raw_rsrp_dbm);
        self.entries.push(RelayCandidate {
            l2_id,
            relay_code,
            last_seen: now,
            filter,
        });
        ObservationOutcome {
            is_new: true,
            eligibility_changed: eligible,
            rsrp_dbm,
            eligible,
        }
    }

    /// Returns the candidates in discovery order.
    pub fn list(&self) -> &[RelayCandidate] {
        &self.entries
    }

    /// Looks up a candidate by identity.
    pub fn get(&self, l2_id: u32, relay_code: u32) -> Option<&RelayCandidate> {
        self.entries
            .iter()
            .find(|e| e.l2_id == l2_id && e.relay_code == relay_code)
    }

    /// Removes candidates not refreshed within the expiry window.
    ///
    /// Returns the identities of the removed candidates; a no-op when no
    /// expiry is configured.
    pub fn prune_stale(&mut self) -> Vec<(u32, u32)> {
        let Some(expiry) = self.expiry else {
            return Vec::new();
        };
        let now = Instant::now();
        let mut removed = Vec::new();
        self.entries.retain(|e| {
            if now.duration_since(e.last_seen) >= expiry {
                removed.push((e.l2_id, e.relay_code));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of known candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no candidates are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
