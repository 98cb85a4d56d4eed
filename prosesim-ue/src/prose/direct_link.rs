//! ProSe Direct Link State Machine
//!
//! Each side of a ProSe direct link runs its own instance of this state
//! machine; the two instances are kept consistent only through the PC5-S
//! messages they exchange. The machine is transport-agnostic: every input
//! returns the list of [`LinkAction`]s for the owning task to perform
//! (messages to send, events to report).
//!
//! # States
//!
//! `Idle → Requesting → Connected → Releasing → Idle`, with failure paths
//! returning to `Idle`.
//!
//! # Retransmission
//!
//! - T5080 guards the establishment request: each expiry retransmits, and
//!   the expiry after the budget is exhausted fails the link back to `Idle`.
//! - T5087 guards the release request: each expiry retransmits until the
//!   budget is reached, at which point the machine force-transitions to
//!   `Idle` with or without the peer's acknowledgment. A release is never
//!   allowed to hang.
//!
//! Entering a state cancels the timer armed by the state being left;
//! duplicate or late messages are ignored with a diagnostic action.

use std::fmt;
use std::time::Instant;

use prosesim_common::config::ProseConfig;
use prosesim_pc5::{
    DirectLinkEstablishmentAccept, DirectLinkEstablishmentRequest, DirectLinkReleaseAccept,
    DirectLinkReleaseRequest, Pc5Message, ReleaseCause,
};

use crate::timer::{ProseTimer, TIMER_T5080, TIMER_T5087};

/// Direct link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectLinkState {
    /// No direct link
    Idle,
    /// Establishment request sent or received, accept pending
    Requesting,
    /// Direct link established
    Connected,
    /// Release request sent, acknowledgment pending
    Releasing,
}

impl fmt::Display for DirectLinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectLinkState::Idle => write!(f, "IDLE"),
            DirectLinkState::Requesting => write!(f, "REQUESTING"),
            DirectLinkState::Connected => write!(f, "CONNECTED"),
            DirectLinkState::Releasing => write!(f, "RELEASING"),
        }
    }
}

/// Which side of the link this instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectLinkRole {
    /// The side that sends the establishment request
    Initiator,
    /// The side that accepts the establishment request
    Target,
}

/// Timer durations and retransmission budgets for a direct link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectLinkConfig {
    /// T5080 duration (establishment request retransmission)
    pub t5080: std::time::Duration,
    /// Maximum establishment request retransmissions
    pub t5080_max_retx: u32,
    /// T5087 duration (release request retransmission)
    pub t5087: std::time::Duration,
    /// Maximum release request retransmissions
    pub t5087_max_retx: u32,
}

impl From<&ProseConfig> for DirectLinkConfig {
    fn from(config: &ProseConfig) -> Self {
        Self {
            t5080: config.t5080(),
            t5080_max_retx: config.t5080_max_retx,
            t5087: config.t5087(),
            t5087_max_retx: config.t5087_max_retx,
        }
    }
}

/// Output of a state machine input: work for the owning task to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkAction {
    /// Send this PC5-S message to the peer
    SendMessage(Pc5Message),
    /// The link changed state
    StateChanged {
        /// Previous state
        old: DirectLinkState,
        /// New state
        new: DirectLinkState,
    },
    /// The link reached `Connected`
    Established,
    /// Establishment failed after exhausting the T5080 budget
    EstablishmentFailed,
    /// The link returned to `Idle` from `Releasing` or a peer release
    Released,
    /// A message was ignored because the current state cannot process it
    Ignored {
        /// Short diagnostic description
        detail: &'static str,
    },
}

/// One side of a ProSe direct link.
#[derive(Debug)]
pub struct DirectLink {
    local_l2_id: u32,
    peer_l2_id: u32,
    relay_code: u32,
    role: DirectLinkRole,
    state: DirectLinkState,
    config: DirectLinkConfig,
    t5080: ProseTimer,
    t5087: ProseTimer,
    release_cause: ReleaseCause,
    established_at: Option<Instant>,
}

impl DirectLink {
    /// Creates the initiator-side instance of a link.
    pub fn new_initiator(
        local_l2_id: u32,
        peer_l2_id: u32,
        relay_code: u32,
        config: DirectLinkConfig,
    ) -> Self {
        Self::new(local_l2_id, peer_l2_id, relay_code, DirectLinkRole::Initiator, config)
    }

    /// Creates the target-side instance of a link.
    pub fn new_target(
        local_l2_id: u32,
        peer_l2_id: u32,
        relay_code: u32,
        config: DirectLinkConfig,
    ) -> Self {
        Self::new(local_l2_id, peer_l2_id, relay_code, DirectLinkRole::Target, config)
    }

    fn new(
        local_l2_id: u32,
        peer_l2_id: u32,
        relay_code: u32,
        role: DirectLinkRole,
        config: DirectLinkConfig,
    ) -> Self {
        Self {
            local_l2_id,
            peer_l2_id,
            relay_code,
            role,
            state: DirectLinkState::Idle,
            config,
            t5080: ProseTimer::new(TIMER_T5080, config.t5080),
            t5087: ProseTimer::new(TIMER_T5087, config.t5087),
            release_cause: ReleaseCause::ExplicitDisconnect,
            established_at: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> DirectLinkState {
        self.state
    }

    /// L2 identifier of the peer.
    pub fn peer_l2_id(&self) -> u32 {
        self.peer_l2_id
    }

    /// Relay service code of the link (0 for plain unicast).
    pub fn relay_code(&self) -> u32 {
        self.relay_code
    }

    /// Which side of the link this instance is.
    pub fn role(&self) -> DirectLinkRole {
        self.role
    }

    /// True while the link occupies the relay slot (establishment pending or
    /// established).
    pub fn is_active(&self) -> bool {
        matches!(self.state, DirectLinkState::Requesting | DirectLinkState::Connected)
    }

    /// Time the link reached `Connected`, if it did.
    pub fn established_at(&self) -> Option<Instant> {
        self.established_at
    }

    #[cfg(test)]
    pub(crate) fn t5080_running(&self) -> bool {
        self.t5080.is_running()
    }

    #[cfg(test)]
    pub(crate) fn t5087_running(&self) -> bool {
        self.t5087.is_running()
    }

    fn transition(&mut self, new: DirectLinkState, actions: &mut Vec<LinkAction>) {
        let old = self.state;
        self.state = new;
        actions.push(LinkAction::StateChanged { old, new });
    }

    fn establishment_request(&self) -> Pc5Message {
        Pc5Message::DirectLinkEstablishmentRequest(DirectLinkEstablishmentRequest {
            source_l2_id: self.local_l2_id,
            target_l2_id: self.peer_l2_id,
            relay_code: self.relay_code,
        })
    }

    fn establishment_accept(&self) -> Pc5Message {
        Pc5Message::DirectLinkEstablishmentAccept(DirectLinkEstablishmentAccept {
            source_l2_id: self.local_l2_id,
            target_l2_id: self.peer_l2_id,
            relay_code: self.relay_code,
        })
    }

    fn release_request(&self) -> Pc5Message {
        Pc5Message::DirectLinkReleaseRequest(DirectLinkReleaseRequest {
            source_l2_id: self.local_l2_id,
            target_l2_id: self.peer_l2_id,
            relay_code: self.relay_code,
            cause: self.release_cause,
        })
    }

    fn release_accept(&self) -> Pc5Message {
        Pc5Message::DirectLinkReleaseAccept(DirectLinkReleaseAccept {
            source_l2_id: self.local_l2_id,
            target_l2_id: self.peer_l2_id,
            relay_code: self.relay_code,
        })
    }

    /// Initiator: starts the establishment procedure.
    ///
    /// Sends the establishment request and arms T5080.
    pub fn start_establishment(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        if self.state != DirectLinkState::Idle {
            actions.push(LinkAction::Ignored {
                detail: "establishment start while link not idle",
            });
            return actions;
        }
        self.transition(DirectLinkState::Requesting, &mut actions);
        actions.push(LinkAction::SendMessage(self.establishment_request()));
        self.t5080.start(true);
        actions
    }

    /// Target: processes a received establishment request.
    ///
    /// A fresh request is accepted and the link goes `Connected`; a
    /// duplicate request (the peer missed our accept) re-sends the accept.
    pub fn on_establishment_request(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        match self.state {
            DirectLinkState::Idle => {
                self.transition(DirectLinkState::Requesting, &mut actions);
                actions.push(LinkAction::SendMessage(self.establishment_accept()));
                self.transition(DirectLinkState::Connected, &mut actions);
                self.established_at = Some(Instant::now());
                actions.push(LinkAction::Established);
            }
            DirectLinkState::Requesting | DirectLinkState::Connected => {
                // Our accept was lost; repeat it
                actions.push(LinkAction::SendMessage(self.establishment_accept()));
            }
            DirectLinkState::Releasing => {
                actions.push(LinkAction::Ignored {
                    detail: "establishment request while releasing",
                });
            }
        }
        actions
    }

    /// Initiator: processes a received establishment accept.
    ///
    /// Cancels T5080 and moves to `Connected`.
    pub fn on_establishment_accept(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        if self.state != DirectLinkState::Requesting {
            actions.push(LinkAction::Ignored {
                detail: "establishment accept while not requesting",
            });
            return actions;
        }
        self.t5080.stop(true);
        self.transition(DirectLinkState::Connected, &mut actions);
        self.established_at = Some(Instant::now());
        actions.push(LinkAction::Established);
        actions
    }

    /// Initiator: processes a received establishment reject.
    pub fn on_establishment_reject(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        if self.state != DirectLinkState::Requesting {
            actions.push(LinkAction::Ignored {
                detail: "establishment reject while not requesting",
            });
            return actions;
        }
        self.t5080.stop(true);
        self.transition(DirectLinkState::Idle, &mut actions);
        actions.push(LinkAction::EstablishmentFailed);
        actions
    }

    /// Starts the release procedure.
    ///
    /// Valid from `Requesting` (abandoning a pending establishment) and
    /// `Connected`. Sends the release request and arms T5087.
    pub fn start_release(&mut self, cause: ReleaseCause) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        if !self.is_active() {
            actions.push(LinkAction::Ignored {
                detail: "release start while link not active",
            });
            return actions;
        }
        self.t5080.stop(true);
        self.release_cause = cause;
        self.transition(DirectLinkState::Releasing, &mut actions);
        actions.push(LinkAction::SendMessage(self.release_request()));
        self.t5087.start(true);
        actions
    }

    /// Processes a release request from the peer.
    ///
    /// Always acknowledged, even when already `Idle` (the peer may have
    /// missed an earlier accept). A live link walks through `Releasing` on
    /// its way down.
    pub fn on_release_request(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        if self.state == DirectLinkState::Idle {
            actions.push(LinkAction::SendMessage(self.release_accept()));
            return actions;
        }
        self.t5080.stop(true);
        self.t5087.stop(true);
        if self.state != DirectLinkState::Releasing {
            self.transition(DirectLinkState::Releasing, &mut actions);
        }
        actions.push(LinkAction::SendMessage(self.release_accept()));
        self.transition(DirectLinkState::Idle, &mut actions);
        self.established_at = None;
        actions.push(LinkAction::Released);
        actions
    }

    /// Processes a release accept from the peer.
    ///
    /// Only meaningful in `Releasing`; anything else is a late duplicate
    /// and is ignored with a diagnostic.
    pub fn on_release_accept(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        if self.state != DirectLinkState::Releasing {
            actions.push(LinkAction::Ignored {
                detail: "release accept while not releasing",
            });
            return actions;
        }
        self.t5087.stop(true);
        self.transition(DirectLinkState::Idle, &mut actions);
        self.established_at = None;
        actions.push(LinkAction::Released);
        actions
    }

    /// Drives the retransmission timers.
    ///
    /// Call periodically; returns the actions for any expiry processed.
    pub fn perform_tick(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        match self.state {
            DirectLinkState::Requesting => {
                if self.role == DirectLinkRole::Initiator && self.t5080.perform_tick() {
                    if self.t5080.expiry_count() <= self.config.t5080_max_retx {
                        actions.push(LinkAction::SendMessage(self.establishment_request()));
                        self.t5080.start(false);
                    } else {
                        self.t5080.stop(true);
                        self.transition(DirectLinkState::Idle, &mut actions);
                        actions.push(LinkAction::EstablishmentFailed);
                    }
                }
            }
            DirectLinkState::Releasing => {
                if self.t5087.perform_tick() {
                    if self.t5087.expiry_count() < self.config.t5087_max_retx {
                        actions.push(LinkAction::SendMessage(self.release_request()));
                        self.t5087.start(false);
                    } else {
                        // Local cleanup always completes, acknowledged or not
                        self.t5087.stop(true);
                        self.transition(DirectLinkState::Idle, &mut actions);
                        self.established_at = None;
                        actions.push(LinkAction::Released);
                    }
                }
            }
            DirectLinkState::Idle | DirectLinkState::Connected => {}
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn fast_config() -> DirectLinkConfig {
        DirectLinkConfig {
            t5080: Duration::from_millis(30),
            t5080_max_retx: 2,
            t5087: Duration::from_millis(30),
            t5087_max_retx: 2,
        }
    }

    fn sent_messages(actions: &[LinkAction]) -> Vec<&Pc5Message> {
        actions
            .iter()
            .filter_map(|a| match a {
                LinkAction::SendMessage(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn has_action(actions: &[LinkAction], pred: impl Fn(&LinkAction) -> bool) -> bool {
        actions.iter().any(pred)
    }

    #[test]
    fn test_initiator_establishment_happy_path() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        assert_eq!(link.state(), DirectLinkState::Idle);

        let actions = link.start_establishment();
        assert_eq!(link.state(), DirectLinkState::Requesting);
        assert!(link.t5080_running());
        let sent = sent_messages(&actions);
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Pc5Message::DirectLinkEstablishmentRequest(_)));

        let actions = link.on_establishment_accept();
        assert_eq!(link.state(), DirectLinkState::Connected);
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Established)));
        assert!(link.established_at().is_some());
    }

    #[test]
    fn test_connected_cancels_t5080() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        link.start_establishment();
        link.on_establishment_accept();
        assert!(!link.t5080_running());

        // A stale T5080 must not fire after the link is connected
        sleep(Duration::from_millis(50));
        let actions = link.perform_tick();
        assert!(actions.is_empty());
        assert_eq!(link.state(), DirectLinkState::Connected);
    }

    #[test]
    fn test_target_accepts_establishment_request() {
        let mut link = DirectLink::new_target(10, 1, 5, fast_config());
        let actions = link.on_establishment_request();

        assert_eq!(link.state(), DirectLinkState::Connected);
        let sent = sent_messages(&actions);
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Pc5Message::DirectLinkEstablishmentAccept(_)));
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Established)));
        // Target walks Idle -> Requesting -> Connected
        let states: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                LinkAction::StateChanged { new, .. } => Some(*new),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![DirectLinkState::Requesting, DirectLinkState::Connected]);
    }

    #[test]
    fn test_duplicate_establishment_request_repeats_accept() {
        let mut link = DirectLink::new_target(10, 1, 5, fast_config());
        link.on_establishment_request();

        let actions = link.on_establishment_request();
        assert_eq!(link.state(), DirectLinkState::Connected);
        let sent = sent_messages(&actions);
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Pc5Message::DirectLinkEstablishmentAccept(_)));
        assert!(!has_action(&actions, |a| matches!(a, LinkAction::Established)));
    }

    #[test]
    fn test_establishment_retransmission_bound() {
        let config = fast_config();
        let mut link = DirectLink::new_initiator(1, 10, 5, config);
        link.start_establishment();

        let mut retransmissions = 0;
        let mut failed = false;
        // Drive ticks long enough for the full retry budget plus the final
        // failing expiry
        for _ in 0..((config.t5080_max_retx + 2) * 5) {
            sleep(Duration::from_millis(10));
            let actions = link.perform_tick();
            retransmissions += sent_messages(&actions).len();
            if has_action(&actions, |a| matches!(a, LinkAction::EstablishmentFailed)) {
                failed = true;
                break;
            }
        }

        assert!(failed, "establishment never failed");
        assert_eq!(retransmissions as u32, config.t5080_max_retx);
        assert_eq!(link.state(), DirectLinkState::Idle);
    }

    #[test]
    fn test_reject_fails_establishment() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        link.start_establishment();

        let actions = link.on_establishment_reject();
        assert_eq!(link.state(), DirectLinkState::Idle);
        assert!(has_action(&actions, |a| matches!(a, LinkAction::EstablishmentFailed)));
        assert!(!link.t5080_running());
    }

    #[test]
    fn test_release_happy_path() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        link.start_establishment();
        link.on_establishment_accept();

        let actions = link.start_release(ReleaseCause::RelayReselection);
        assert_eq!(link.state(), DirectLinkState::Releasing);
        assert!(link.t5087_running());
        let sent = sent_messages(&actions);
        assert!(matches!(sent[0], Pc5Message::DirectLinkReleaseRequest(m) if m.cause == ReleaseCause::RelayReselection));

        let actions = link.on_release_accept();
        assert_eq!(link.state(), DirectLinkState::Idle);
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Released)));
        assert!(!link.t5087_running());
        assert!(link.established_at().is_none());
    }

    #[test]
    fn test_release_from_requesting_abandons_establishment() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        link.start_establishment();

        let actions = link.start_release(ReleaseCause::RelayReselection);
        assert_eq!(link.state(), DirectLinkState::Releasing);
        assert!(!link.t5080_running());
        assert!(sent_messages(&actions)
            .iter()
            .any(|m| matches!(m, Pc5Message::DirectLinkReleaseRequest(_))));
    }

    #[test]
    fn test_release_terminates_within_budget_without_peer() {
        let config = fast_config();
        let mut link = DirectLink::new_initiator(1, 10, 5, config);
        link.start_establishment();
        link.on_establishment_accept();
        link.start_release(ReleaseCause::ExplicitDisconnect);

        let start = Instant::now();
        let budget = config.t5087 * config.t5087_max_retx;
        let mut released = false;
        while start.elapsed() < budget + Duration::from_millis(20) {
            sleep(Duration::from_millis(5));
            let actions = link.perform_tick();
            if has_action(&actions, |a| matches!(a, LinkAction::Released)) {
                released = true;
                break;
            }
        }

        assert!(released, "release never terminated");
        assert_eq!(link.state(), DirectLinkState::Idle);
        // Terminated within retry budget x T5087 (plus tick granularity)
        assert!(start.elapsed() <= budget + Duration::from_millis(20));
    }

    #[test]
    fn test_peer_release_request_acknowledged_from_connected() {
        let mut link = DirectLink::new_target(10, 1, 5, fast_config());
        link.on_establishment_request();

        let actions = link.on_release_request();
        assert_eq!(link.state(), DirectLinkState::Idle);
        let sent = sent_messages(&actions);
        assert!(matches!(sent[0], Pc5Message::DirectLinkReleaseAccept(_)));
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Released)));
    }

    #[test]
    fn test_duplicate_release_request_still_acknowledged() {
        let mut link = DirectLink::new_target(10, 1, 5, fast_config());
        link.on_establishment_request();
        link.on_release_request();

        // Our accept was lost; the peer retransmits
        let actions = link.on_release_request();
        assert_eq!(link.state(), DirectLinkState::Idle);
        let sent = sent_messages(&actions);
        assert!(matches!(sent[0], Pc5Message::DirectLinkReleaseAccept(_)));
        assert!(!has_action(&actions, |a| matches!(a, LinkAction::Released)));
    }

    #[test]
    fn test_release_accept_outside_releasing_is_ignored() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        link.start_establishment();
        link.on_establishment_accept();

        let actions = link.on_release_accept();
        assert_eq!(link.state(), DirectLinkState::Connected);
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Ignored { .. })));
    }

    #[test]
    fn test_duplicate_accept_ignored_when_connected() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        link.start_establishment();
        link.on_establishment_accept();

        let actions = link.on_establishment_accept();
        assert_eq!(link.state(), DirectLinkState::Connected);
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Ignored { .. })));
    }

    #[test]
    fn test_release_while_idle_is_ignored() {
        let mut link = DirectLink::new_initiator(1, 10, 5, fast_config());
        let actions = link.start_release(ReleaseCause::ExplicitDisconnect);
        assert_eq!(link.state(), DirectLinkState::Idle);
        assert!(has_action(&actions, |a| matches!(a, LinkAction::Ignored { .. })));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", DirectLinkState::Idle), "IDLE");
        assert_eq!(format!("{}", DirectLinkState::Requesting), "REQUESTING");
        assert_eq!(format!("{}", DirectLinkState::Connected), "CONNECTED");
        assert_eq!(format!("{}", DirectLinkState::Releasing), "RELEASING");
    }
}
