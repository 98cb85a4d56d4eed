//! Relay Discovery Engine
//!
//! Drives the periodic discovery signalling for one device and classifies
//! received discovery messages. Two interaction models exist (3GPP TS
//! 23.304), selected per scenario:
//!
//! - **Model A**: relay devices announce themselves periodically; remotes
//!   monitor.
//! - **Model B**: remote devices solicit periodically; matching relays
//!   respond unicast.
//!
//! Discovery is lossy best-effort signalling; the only reliability is the
//! periodic repetition. The first transmission of each device is placed at a
//! uniformly-random offset within a configured window so co-located devices
//! do not burst in lockstep.

use std::time::Duration;

use rand::Rng;

use prosesim_common::config::{DeviceRole, DiscoveryModel};
use prosesim_pc5::{
    DiscoveryAnnouncement, DiscoveryResponse, DiscoverySolicitation, Pc5Message, Vector3,
};

/// Classification of a received discovery message.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// Record a discovery observation for this relay
    Observation {
        /// L2 identifier of the observed relay
        relay_l2_id: u32,
        /// Relay service code observed
        relay_code: u32,
    },
    /// Send a discovery response back to the soliciting remote
    Respond {
        /// L2 identifier of the soliciting remote
        dest_l2_id: u32,
        /// The response message
        msg: Pc5Message,
    },
    /// Message is not relevant for this device's role/model
    Ignored,
}

/// Periodic discovery driver for one device.
#[derive(Debug)]
pub struct DiscoveryEngine {
    l2_id: u32,
    role: DeviceRole,
    model: DiscoveryModel,
    relay_code: u32,
    sim_pos: Vector3,
}

impl DiscoveryEngine {
    /// Creates a discovery engine for the given device identity.
    pub fn new(
        l2_id: u32,
        role: DeviceRole,
        model: DiscoveryModel,
        relay_code: u32,
        sim_pos: Vector3,
    ) -> Self {
        Self {
            l2_id,
            role,
            model,
            relay_code,
            sim_pos,
        }
    }

    /// Draws the uniformly-random offset of the first transmission within
    /// the configured window.
    pub fn initial_offset<R: Rng>(window: Duration, rng: &mut R) -> Duration {
        if window.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..window.as_millis() as u64))
    }

    /// Returns the message to transmit on a discovery tick, if this device
    /// transmits in the configured model.
    ///
    /// Relays announce in Model A; remotes solicit in Model B. All other
    /// role/model combinations only listen.
    pub fn on_tick(&self) -> Option<Pc5Message> {
        match (self.role, self.model) {
            (DeviceRole::Relay, DiscoveryModel::ModelA) => {
                Some(Pc5Message::DiscoveryAnnouncement(DiscoveryAnnouncement {
                    source_l2_id: self.l2_id,
                    relay_code: self.relay_code,
                    sim_pos: self.sim_pos,
                }))
            }
            (DeviceRole::Remote, DiscoveryModel::ModelB) => {
                Some(Pc5Message::DiscoverySolicitation(DiscoverySolicitation {
                    source_l2_id: self.l2_id,
                    relay_code: self.relay_code,
                    sim_pos: self.sim_pos,
                }))
            }
            _ => None,
        }
    }

    /// Classifies a received discovery message.
    pub fn on_message(&self, msg: &Pc5Message) -> DiscoveryOutcome {
        match msg {
            Pc5Message::DiscoveryAnnouncement(m) => {
                if self.role == DeviceRole::Remote
                    && self.model == DiscoveryModel::ModelA
                    && m.relay_code == self.relay_code
                {
                    DiscoveryOutcome::Observation {
                        relay_l2_id: m.source_l2_id,
                        relay_code: m.relay_code,
                    }
                } else {
                    DiscoveryOutcome::Ignored
                }
            }
            Pc5Message::DiscoverySolicitation(m) => {
                if self.role == DeviceRole::Relay
                    && self.model == DiscoveryModel::ModelB
                    && m.relay_code == self.relay_code
                {
                    DiscoveryOutcome::Respond {
                        dest_l2_id: m.source_l2_id,
                        msg: Pc5Message::DiscoveryResponse(DiscoveryResponse {
                            source_l2_id: self.l2_id,
                            relay_code: self.relay_code,
                            sim_pos: self.sim_pos,
                        }),
                    }
                } else {
                    DiscoveryOutcome::Ignored
                }
            }
            Pc5Message::DiscoveryResponse(m) => {
                if self.role == DeviceRole::Remote
                    && self.model == DiscoveryModel::ModelB
                    && m.relay_code == self.relay_code
                {
                    DiscoveryOutcome::Observation {
                        relay_l2_id: m.source_l2_id,
                        relay_code: m.relay_code,
                    }
                } else {
                    DiscoveryOutcome::Ignored
                }
            }
            _ => DiscoveryOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn announcement(source: u32, code: u32) -> Pc5Message {
        Pc5Message::DiscoveryAnnouncement(DiscoveryAnnouncement {
            source_l2_id: source,
            relay_code: code,
            sim_pos: Vector3::default(),
        })
    }

    #[test]
    fn test_relay_announces_in_model_a() {
        let engine = DiscoveryEngine::new(
            10,
            DeviceRole::Relay,
            DiscoveryModel::ModelA,
            5,
            Vector3::new(1, 2, 3),
        );
        match engine.on_tick() {
            Some(Pc5Message::DiscoveryAnnouncement(m)) => {
                assert_eq!(m.source_l2_id, 10);
                assert_eq!(m.relay_code, 5);
                assert_eq!(m.sim_pos, Vector3::new(1, 2, 3));
            }
            other => panic!("expected announcement, got {other:?}"),
        }
    }

    #[test]
    fn test_remote_is_silent_in_model_a() {
        let engine =
            DiscoveryEngine::new(1, DeviceRole::Remote, DiscoveryModel::ModelA, 5, Vector3::default());
        assert!(engine.on_tick().is_none());
    }

    #[test]
    fn test_remote_solicits_in_model_b() {
        let engine =
            DiscoveryEngine::new(1, DeviceRole::Remote, DiscoveryModel::ModelB, 5, Vector3::default());
        match engine.on_tick() {
            Some(Pc5Message::DiscoverySolicitation(m)) => {
                assert_eq!(m.source_l2_id, 1);
                assert_eq!(m.relay_code, 5);
            }
            other => panic!("expected solicitation, got {other:?}"),
        }
    }

    #[test]
    fn test_relay_is_silent_in_model_b() {
        let engine =
            DiscoveryEngine::new(10, DeviceRole::Relay, DiscoveryModel::ModelB, 5, Vector3::default());
        assert!(engine.on_tick().is_none());
    }

    #[test]
    fn test_remote_observes_matching_announcement() {
        let engine =
            DiscoveryEngine::new(1, DeviceRole::Remote, DiscoveryModel::ModelA, 5, Vector3::default());
        let outcome = engine.on_message(&announcement(10, 5));
        assert_eq!(
            outcome,
            DiscoveryOutcome::Observation {
                relay_l2_id: 10,
                relay_code: 5
            }
        );
    }

    #[test]
    fn test_remote_ignores_foreign_relay_code() {
        let engine =
            DiscoveryEngine::new(1, DeviceRole::Remote, DiscoveryModel::ModelA, 5, Vector3::default());
        assert_eq!(engine.on_message(&announcement(10, 6)), DiscoveryOutcome::Ignored);
    }

    #[test]
    fn test_relay_ignores_announcement() {
        let engine =
            DiscoveryEngine::new(11, DeviceRole::Relay, DiscoveryModel::ModelA, 5, Vector3::default());
        assert_eq!(engine.on_message(&announcement(10, 5)), DiscoveryOutcome::Ignored);
    }

    #[test]
    fn test_relay_responds_to_matching_solicitation() {
        let engine = DiscoveryEngine::new(
            10,
            DeviceRole::Relay,
            DiscoveryModel::ModelB,
            5,
            Vector3::new(7, 0, 0),
        );
        let solicitation = Pc5Message::DiscoverySolicitation(DiscoverySolicitation {
            source_l2_id: 1,
            relay_code: 5,
            sim_pos: Vector3::default(),
        });

        match engine.on_message(&solicitation) {
            DiscoveryOutcome::Respond { dest_l2_id, msg } => {
                assert_eq!(dest_l2_id, 1);
                match msg {
                    Pc5Message::DiscoveryResponse(r) => {
                        assert_eq!(r.source_l2_id, 10);
                        assert_eq!(r.relay_code, 5);
                        assert_eq!(r.sim_pos, Vector3::new(7, 0, 0));
                    }
                    other => panic!("expected response, got {other:?}"),
                }
            }
            other => panic!("expected respond outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_remote_observes_response_in_model_b() {
        let engine =
            DiscoveryEngine::new(1, DeviceRole::Remote, DiscoveryModel::ModelB, 5, Vector3::default());
        let response = Pc5Message::DiscoveryResponse(DiscoveryResponse {
            source_l2_id: 10,
            relay_code: 5,
            sim_pos: Vector3::default(),
        });
        assert_eq!(
            engine.on_message(&response),
            DiscoveryOutcome::Observation {
                relay_l2_id: 10,
                relay_code: 5
            }
        );
    }

    #[test]
    fn test_initial_offset_within_window() {
        let mut rng = StdRng::seed_from_u64(3);
        let window = Duration::from_millis(500);
        for _ in 0..100 {
            let offset = DiscoveryEngine::initial_offset(window, &mut rng);
            assert!(offset < window);
        }
        assert_eq!(
            DiscoveryEngine::initial_offset(Duration::ZERO, &mut rng),
            Duration::ZERO
        );
    }
}
