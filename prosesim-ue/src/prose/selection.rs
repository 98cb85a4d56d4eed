//! Relay Selection Algorithms
//!
//! A remote device picks at most one relay from its registry snapshot. The
//! algorithm set is fixed and small, so the flavors are a closed enum
//! dispatched through a single `match` rather than an open trait hierarchy.
//!
//! Returning `None` is not an error: it means "stay unconnected this round".

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use prosesim_common::config::{ProseConfig, SelectionAlgorithm};

use super::registry::RelayCandidate;

/// Identity and quality snapshot of a selected relay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayInfo {
    /// L2 identifier of the relay
    pub l2_id: u32,
    /// Relay service code
    pub relay_code: u32,
    /// Filtered RSRP at selection time
    pub rsrp_dbm: f64,
    /// Eligibility at selection time
    pub eligible: bool,
}

impl From<&RelayCandidate> for RelayInfo {
    fn from(candidate: &RelayCandidate) -> Self {
        Self {
            l2_id: candidate.l2_id,
            relay_code: candidate.relay_code,
            rsrp_dbm: candidate.rsrp_dbm(),
            eligible: candidate.eligible(),
        }
    }
}

/// Relay selection algorithm flavors.
///
/// The random flavor owns a private seeded stream so the same seed sequence
/// yields the same selection sequence across runs.
#[derive(Debug)]
pub enum RelaySelectionAlgorithm {
    /// First discovered relay, in registry order.
    ///
    /// Deliberately does not consult the eligibility flag.
    FirstAvailable,
    /// Uniformly-random relay from the full candidate list
    Random {
        /// Private random stream
        rng: StdRng,
    },
    /// Eligible relay with the maximum filtered RSRP
    MaxRsrp,
}

impl RelaySelectionAlgorithm {
    /// Creates the first-available flavor.
    pub fn first_available() -> Self {
        Self::FirstAvailable
    }

    /// Creates the random flavor with an explicit seed.
    pub fn random(seed: u64) -> Self {
        Self::Random {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates the max-RSRP flavor.
    pub fn max_rsrp() -> Self {
        Self::MaxRsrp
    }

    /// Creates the flavor named by the configuration.
    pub fn from_config(config: &ProseConfig) -> Self {
        match config.selection_algorithm {
            SelectionAlgorithm::FirstAvailable => Self::first_available(),
            SelectionAlgorithm::Random => Self::random(config.selection_seed),
            SelectionAlgorithm::MaxRsrp => Self::max_rsrp(),
        }
    }

    /// Selects a relay from the candidate snapshot.
    ///
    /// Returns `None` when no relay qualifies; the caller treats this as
    /// "stay idle", never as a failure.
    pub fn select_relay(&mut self, candidates: &[RelayCandidate]) -> Option<RelayInfo> {
        match self {
            Self::FirstAvailable => {
                let relay = candidates.first().map(RelayInfo::from);
                match &relay {
                    Some(r) => info!("Selection algorithm: first available relay L2 ID {}", r.l2_id),
                    None => info!("Selection algorithm: no available relays"),
                }
                relay
            }
            Self::Random { rng } => {
                if candidates.is_empty() {
                    info!("Selection algorithm: no available relays");
                    return None;
                }
                let i = rng.gen_range(0..candidates.len());
                let relay = RelayInfo::from(&candidates[i]);
                info!("Selection algorithm: random relay L2 ID {}", relay.l2_id);
                Some(relay)
            }
            Self::MaxRsrp => {
                let mut best: Option<RelayInfo> = None;
                for candidate in candidates {
                    if !candidate.eligible() {
                        continue;
                    }
                    let stronger = match &best {
                        Some(b) => candidate.rsrp_dbm() > b.rsrp_dbm,
                        None => true,
                    };
                    if stronger {
                        debug!(
                            "Selection algorithm: candidate L2 ID {} with RSRP {:.1}",
                            candidate.l2_id,
                            candidate.rsrp_dbm()
                        );
                        best = Some(RelayInfo::from(candidate));
                    }
                }
                match &best {
                    Some(r) => info!(
                        "Selection algorithm: selected L2 ID {} with RSRP {:.1}",
                        r.l2_id, r.rsrp_dbm
                    ),
                    None => info!("Selection algorithm: no eligible relay was found"),
                }
                best
            }
        }
    }
}
