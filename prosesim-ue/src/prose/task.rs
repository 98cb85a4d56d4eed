//! ProSe Task Implementation
//!
//! The ProSe task is the orchestration actor of a device. It owns the relay
//! registry, the selection algorithm, and the direct-link state machines,
//! and wires them together:
//!
//! discovery reception → registry update → (material change or reselection
//! tick) → relay selection → direct-link management.
//!
//! When the selection algorithm picks a relay different from the one backing
//! the current link, the existing link is driven through `Releasing` to
//! `Idle` before establishment toward the new relay starts; a remote never
//! holds two relay links for the same service code.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant as TokioInstant};
use tracing::{debug, info, warn};

use prosesim_common::config::DeviceRole;
use prosesim_pc5::{
    DirectLinkEstablishmentReject, DirectLinkReleaseAccept, EstablishmentRejectCause, Pc5Message,
    ReleaseCause, Vector3,
};

use crate::tasks::{
    BearerMessage, DeviceTaskBase, ProseTaskMessage, SidelinkTaskMessage, Task, TaskMessage,
};

use super::direct_link::{DirectLink, DirectLinkConfig, DirectLinkState, LinkAction};
use super::discovery::{DiscoveryEngine, DiscoveryOutcome};
use super::filter::RsrpFilterConfig;
use super::registry::RelayRegistry;
use super::selection::{RelayInfo, RelaySelectionAlgorithm};
use super::ProseEvent;

/// ProSe orchestration task for one device.
pub struct ProseTask {
    task_base: DeviceTaskBase,
    l2_id: u32,
    role: DeviceRole,
    relay_code: u32,
    registry: RelayRegistry,
    selector: RelaySelectionAlgorithm,
    discovery: DiscoveryEngine,
    link_config: DirectLinkConfig,
    links: HashMap<u32, DirectLink>,
    /// Relay to establish toward once the current link finishes releasing
    pending_relay: Option<RelayInfo>,
    /// Peers with an activated data path
    active_data_paths: HashSet<u32>,
}

impl ProseTask {
    /// Creates the ProSe task from the device configuration.
    pub fn new(task_base: DeviceTaskBase) -> Self {
        let config = task_base.config.clone();
        let prose = &config.prose;
        let sim_pos = Vector3::new(config.sim_pos[0], config.sim_pos[1], config.sim_pos[2]);

        Self {
            l2_id: config.l2_id,
            role: config.role,
            relay_code: config.relay_code,
            registry: RelayRegistry::new(RsrpFilterConfig::from(prose), prose.candidate_expiry()),
            selector: RelaySelectionAlgorithm::from_config(prose),
            discovery: DiscoveryEngine::new(
                config.l2_id,
                config.role,
                prose.discovery_model,
                config.relay_code,
                sim_pos,
            ),
            link_config: DirectLinkConfig::from(prose),
            links: HashMap::new(),
            pending_relay: None,
            active_data_paths: HashSet::new(),
            task_base,
        }
    }

    /// Number of relay candidates currently known.
    pub fn candidate_count(&self) -> usize {
        self.registry.len()
    }

    /// Peer of the link currently backing the relay service, if any.
    pub fn current_relay(&self) -> Option<u32> {
        self.links
            .values()
            .find(|l| l.relay_code() == self.relay_code && l.is_active())
            .map(|l| l.peer_l2_id())
    }

    async fn send_pc5(&self, dest_l2_id: Option<u32>, msg: Pc5Message) {
        if self
            .task_base
            .sidelink_tx
            .send(SidelinkTaskMessage::Pc5Send { dest_l2_id, msg })
            .await
            .is_err()
        {
            warn!("Sidelink task unavailable, dropping PC5 message");
        }
    }

    async fn handle_discovery_tick(&mut self) {
        if let Some(msg) = self.discovery.on_tick() {
            debug!("Discovery tick: broadcasting {}", msg.message_name());
            self.send_pc5(None, msg).await;
        }
    }

    async fn handle_reselection_tick(&mut self) {
        let removed = self.registry.prune_stale();
        for (l2_id, relay_code) in &removed {
            info!(
                "Relay candidate expired: relay_l2_id={}, relay_code={}",
                l2_id, relay_code
            );
        }
        self.evaluate_selection().await;
    }

    async fn handle_link_tick(&mut self) {
        let peers: Vec<u32> = self.links.keys().copied().collect();
        for peer in peers {
            let actions = match self.links.get_mut(&peer) {
                Some(link) => link.perform_tick(),
                None => continue,
            };
            if !actions.is_empty() {
                let relay_code = self.links.get(&peer).map(DirectLink::relay_code).unwrap_or(0);
                self.process_link_actions(peer, relay_code, actions).await;
            }
        }
        self.cleanup_and_continue_switch().await;
    }

    async fn handle_message(&mut self, msg: ProseTaskMessage) {
        match msg {
            ProseTaskMessage::Pc5Delivery { msg, rsrp_dbm } => {
                self.handle_pc5_delivery(msg, rsrp_dbm).await;
            }
            ProseTaskMessage::ReleaseLink { peer_l2_id, cause } => {
                self.handle_release_link(peer_l2_id, cause).await;
            }
            ProseTaskMessage::TriggerReselection => {
                self.evaluate_selection().await;
            }
        }
    }

    async fn handle_pc5_delivery(&mut self, msg: Pc5Message, rsrp_dbm: Option<f64>) {
        match &msg {
            Pc5Message::DiscoveryAnnouncement(_)
            | Pc5Message::DiscoverySolicitation(_)
            | Pc5Message::DiscoveryResponse(_) => {
                self.handle_discovery_message(&msg, rsrp_dbm).await;
            }
            Pc5Message::DirectLinkEstablishmentRequest(m) => {
                let m = *m;
                self.handle_establishment_request(m.source_l2_id, m.relay_code).await;
            }
            Pc5Message::DirectLinkEstablishmentAccept(m) => {
                let peer = m.source_l2_id;
                let actions = match self.links.get_mut(&peer) {
                    Some(link) => link.on_establishment_accept(),
                    None => {
                        self.emit_violation(peer, "establishment accept for unknown link");
                        return;
                    }
                };
                let relay_code = msg.relay_code();
                self.process_link_actions(peer, relay_code, actions).await;
                self.cleanup_and_continue_switch().await;
            }
            Pc5Message::DirectLinkEstablishmentReject(m) => {
                let peer = m.source_l2_id;
                let actions = match self.links.get_mut(&peer) {
                    Some(link) => link.on_establishment_reject(),
                    None => {
                        self.emit_violation(peer, "establishment reject for unknown link");
                        return;
                    }
                };
                let relay_code = msg.relay_code();
                self.process_link_actions(peer, relay_code, actions).await;
                self.cleanup_and_continue_switch().await;
            }
            Pc5Message::DirectLinkReleaseRequest(m) => {
                let m = *m;
                self.handle_release_request(m.source_l2_id, m.relay_code).await;
            }
            Pc5Message::DirectLinkReleaseAccept(m) => {
                let peer = m.source_l2_id;
                let actions = match self.links.get_mut(&peer) {
                    Some(link) => link.on_release_accept(),
                    None => {
                        // Late acknowledgment after forced local cleanup
                        self.emit_violation(peer, "release accept for unknown link");
                        return;
                    }
                };
                let relay_code = msg.relay_code();
                self.process_link_actions(peer, relay_code, actions).await;
                self.cleanup_and_continue_switch().await;
            }
        }
    }

    async fn handle_discovery_message(&mut self, msg: &Pc5Message, rsrp_dbm: Option<f64>) {
        match self.discovery.on_message(msg) {
            DiscoveryOutcome::Observation {
                relay_l2_id,
                relay_code,
            } => {
                let Some(raw_rsrp) = rsrp_dbm else {
                    debug!("Discovery message without RSRP sample, ignoring");
                    return;
                };
                let outcome = self.registry.observe(relay_l2_id, relay_code, raw_rsrp);
                if outcome.is_new {
                    info!(
                        "Relay discovered: relay_l2_id={}, relay_code={}, rsrp={:.1} dBm",
                        relay_l2_id, relay_code, outcome.rsrp_dbm
                    );
                    self.task_base.emit_event(ProseEvent::RelayDiscovered {
                        remote_l2_id: self.l2_id,
                        relay_l2_id,
                        relay_code,
                        rsrp_dbm: outcome.rsrp_dbm,
                    });
                } else {
                    self.task_base.emit_event(ProseEvent::RelayRsrpUpdated {
                        remote_l2_id: self.l2_id,
                        relay_l2_id,
                        rsrp_dbm: outcome.rsrp_dbm,
                    });
                }
                if outcome.is_material() {
                    self.evaluate_selection().await;
                }
            }
            DiscoveryOutcome::Respond { dest_l2_id, msg } => {
                debug!("Responding to solicitation from L2 ID {}", dest_l2_id);
                self.send_pc5(Some(dest_l2_id), msg).await;
            }
            DiscoveryOutcome::Ignored => {}
        }
    }

    async fn handle_establishment_request(&mut self, peer: u32, requested_code: u32) {
        let acceptable = requested_code == 0
            || (self.role == DeviceRole::Relay && requested_code == self.relay_code);
        if !acceptable {
            info!(
                "Rejecting establishment request from L2 ID {}: relay_code={} not offered",
                peer, requested_code
            );
            self.send_pc5(
                Some(peer),
                Pc5Message::DirectLinkEstablishmentReject(DirectLinkEstablishmentReject {
                    source_l2_id: self.l2_id,
                    target_l2_id: peer,
                    relay_code: requested_code,
                    cause: EstablishmentRejectCause::ServiceNotOffered,
                }),
            )
            .await;
            return;
        }

        let link_config = self.link_config;
        let l2_id = self.l2_id;
        let link = self
            .links
            .entry(peer)
            .or_insert_with(|| DirectLink::new_target(l2_id, peer, requested_code, link_config));
        let actions = link.on_establishment_request();
        self.process_link_actions(peer, requested_code, actions).await;
    }

    async fn handle_release_request(&mut self, peer: u32, relay_code: u32) {
        match self.links.get_mut(&peer) {
            Some(link) => {
                let actions = link.on_release_request();
                self.process_link_actions(peer, relay_code, actions).await;
                self.cleanup_and_continue_switch().await;
            }
            None => {
                // No local state left; acknowledge so the peer's release
                // terminates without exhausting its T5087 budget
                debug!("Release request for unknown link from L2 ID {}, acknowledging", peer);
                self.send_pc5(
                    Some(peer),
                    Pc5Message::DirectLinkReleaseAccept(DirectLinkReleaseAccept {
                        source_l2_id: self.l2_id,
                        target_l2_id: peer,
                        relay_code,
                    }),
                )
                .await;
            }
        }
    }

    async fn handle_release_link(&mut self, peer: u32, cause: ReleaseCause) {
        let actions = match self.links.get_mut(&peer) {
            Some(link) => link.start_release(cause),
            None => {
                warn!("Release requested for unknown link to L2 ID {}", peer);
                return;
            }
        };
        let relay_code = self.links.get(&peer).map(DirectLink::relay_code).unwrap_or(0);
        self.process_link_actions(peer, relay_code, actions).await;
        self.cleanup_and_continue_switch().await;
    }

    /// Runs the selection algorithm over the registry snapshot and drives
    /// the relay switch when the choice differs from the current relay.
    async fn evaluate_selection(&mut self) {
        if self.role != DeviceRole::Remote {
            return;
        }

        let Some(selected) = self.selector.select_relay(self.registry.list()) else {
            // No candidate qualifies: stay idle, not an error
            return;
        };

        let current = self.current_relay();
        if current == Some(selected.l2_id) {
            return;
        }

        // A switch is already in flight; retarget the pending establishment
        if self
            .links
            .values()
            .any(|l| l.relay_code() == self.relay_code && l.state() == DirectLinkState::Releasing)
        {
            if self.pending_relay.map(|p| p.l2_id) != Some(selected.l2_id) {
                self.pending_relay = Some(selected);
            }
            return;
        }

        info!(
            "Relay selected: current={:?}, selected={}, rsrp={:.1} dBm",
            current, selected.l2_id, selected.rsrp_dbm
        );
        self.task_base.emit_event(ProseEvent::RelaySelected {
            remote_l2_id: self.l2_id,
            current_relay_l2_id: current,
            selected_relay_l2_id: selected.l2_id,
            relay_code: selected.relay_code,
            rsrp_dbm: selected.rsrp_dbm,
        });

        match current {
            Some(current_peer) => {
                // Release the existing link first; establishment toward the
                // new relay starts only once the release completes
                self.pending_relay = Some(selected);
                let actions = match self.links.get_mut(&current_peer) {
                    Some(link) => link.start_release(ReleaseCause::RelayReselection),
                    None => return,
                };
                let relay_code = self.relay_code;
                self.process_link_actions(current_peer, relay_code, actions).await;
                self.cleanup_and_continue_switch().await;
            }
            None => {
                self.establish_link(selected).await;
            }
        }
    }

    async fn establish_link(&mut self, relay: RelayInfo) {
        info!(
            "Establishing direct link to relay L2 ID {} (relay_code={})",
            relay.l2_id, relay.relay_code
        );
        let link = self.links.entry(relay.l2_id).or_insert_with(|| {
            DirectLink::new_initiator(self.l2_id, relay.l2_id, relay.relay_code, self.link_config)
        });
        let actions = link.start_establishment();
        self.process_link_actions(relay.l2_id, relay.relay_code, actions).await;
    }

    /// Drops links that returned to `Idle` and, once no link occupies the
    /// relay service, starts the establishment held back by a switch.
    async fn cleanup_and_continue_switch(&mut self) {
        self.links.retain(|_, l| l.state() != DirectLinkState::Idle);

        if let Some(target) = self.pending_relay {
            let busy = self
                .links
                .values()
                .any(|l| l.relay_code() == self.relay_code);
            if !busy {
                self.pending_relay = None;
                self.establish_link(target).await;
            }
        }
    }

    async fn process_link_actions(&mut self, peer: u32, relay_code: u32, actions: Vec<LinkAction>) {
        for action in actions {
            match action {
                LinkAction::SendMessage(msg) => {
                    self.send_pc5(Some(peer), msg).await;
                }
                LinkAction::StateChanged { old, new } => {
                    info!(
                        "Direct link to L2 ID {} changed state: {} -> {}",
                        peer, old, new
                    );
                    self.task_base.emit_event(ProseEvent::LinkStateChanged {
                        local_l2_id: self.l2_id,
                        peer_l2_id: peer,
                        relay_code,
                        old_state: old,
                        new_state: new,
                    });
                }
                LinkAction::Established => {
                    info!("Direct link to L2 ID {} established", peer);
                    self.task_base.emit_event(ProseEvent::LinkEstablished {
                        local_l2_id: self.l2_id,
                        peer_l2_id: peer,
                        relay_code,
                    });
                    if relay_code != 0 && self.active_data_paths.insert(peer) {
                        let _ = self
                            .task_base
                            .bearer_tx
                            .send(BearerMessage::ActivateDataPath {
                                peer_l2_id: peer,
                                relay_code,
                            })
                            .await;
                        self.task_base.emit_event(ProseEvent::DataPathActivated {
                            local_l2_id: self.l2_id,
                            peer_l2_id: peer,
                            relay_code,
                        });
                    }
                }
                LinkAction::Released => {
                    info!("Direct link to L2 ID {} released", peer);
                    self.task_base.emit_event(ProseEvent::LinkReleased {
                        local_l2_id: self.l2_id,
                        peer_l2_id: peer,
                        relay_code,
                    });
                    if self.active_data_paths.remove(&peer) {
                        let _ = self
                            .task_base
                            .bearer_tx
                            .send(BearerMessage::DeactivateDataPath {
                                peer_l2_id: peer,
                                relay_code,
                            })
                            .await;
                        self.task_base.emit_event(ProseEvent::DataPathDeactivated {
                            local_l2_id: self.l2_id,
                            peer_l2_id: peer,
                            relay_code,
                        });
                    }
                }
                LinkAction::EstablishmentFailed => {
                    // Non-fatal: stay idle until the next reselection round
                    warn!("Direct link establishment to L2 ID {} failed", peer);
                    self.task_base.emit_event(ProseEvent::LinkEstablishmentFailed {
                        local_l2_id: self.l2_id,
                        peer_l2_id: peer,
                        relay_code,
                    });
                }
                LinkAction::Ignored { detail } => {
                    debug!("Ignored PC5 message from L2 ID {}: {}", peer, detail);
                    self.emit_violation(peer, detail);
                }
            }
        }
    }

    fn emit_violation(&self, peer: u32, detail: &'static str) {
        self.task_base.emit_event(ProseEvent::ProtocolViolation {
            local_l2_id: self.l2_id,
            peer_l2_id: peer,
            detail,
        });
    }
}

#[async_trait::async_trait]
impl Task for ProseTask {
    type Message = ProseTaskMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        let prose = self.task_base.config.prose.clone();
        info!(
            "ProSe task starting: l2_id={}, role={}, model={}, algorithm={}",
            self.l2_id, self.role, prose.discovery_model, prose.selection_algorithm
        );

        // First discovery transmission lands at a random offset within the
        // slot window so co-located devices do not burst together
        let offset =
            DiscoveryEngine::initial_offset(prose.discovery_slot_window(), &mut rand::thread_rng());
        let mut discovery_timer = interval_at(
            TokioInstant::now() + offset,
            prose.discovery_interval(),
        );
        let mut reselection_timer = interval_at(
            TokioInstant::now() + prose.reselection_interval(),
            prose.reselection_interval(),
        );
        let link_tick = (self.link_config.t5080.min(self.link_config.t5087) / 4)
            .clamp(Duration::from_millis(10), Duration::from_millis(250));
        let mut link_timer = tokio::time::interval(link_tick);

        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    match msg {
                        TaskMessage::Message(m) => self.handle_message(m).await,
                        TaskMessage::Shutdown => {
                            info!("ProSe task received shutdown signal");
                            break;
                        }
                    }
                }
                _ = discovery_timer.tick() => self.handle_discovery_tick().await,
                _ = reselection_timer.tick() => self.handle_reselection_tick().await,
                _ = link_timer.tick() => self.handle_link_tick().await,
            }
        }
        info!(
            "ProSe task stopped with {} known candidates",
            self.registry.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prosesim_common::config::{DeviceConfig, ProseConfig};
    use prosesim_pc5::{
        DirectLinkEstablishmentAccept, DiscoveryAnnouncement,
    };
    use tokio::sync::mpsc::Receiver;

    use crate::tasks::DEFAULT_CHANNEL_CAPACITY;

    struct Harness {
        task: ProseTask,
        sidelink_rx: Receiver<TaskMessage<SidelinkTaskMessage>>,
        bearer_rx: Receiver<BearerMessage>,
        event_rx: mpsc::UnboundedReceiver<ProseEvent>,
    }

    fn make_task(l2_id: u32, role: DeviceRole) -> Harness {
        let config = DeviceConfig {
            l2_id,
            role,
            relay_code: 5,
            sim_pos: [0, 0, 0],
            bind_address: "127.0.0.1:0".parse().unwrap(),
            peer_search_list: vec![],
            prose: ProseConfig::default(),
        };
        let (base, _prose_rx, sidelink_rx, bearer_rx, event_rx) =
            DeviceTaskBase::new(config, DEFAULT_CHANNEL_CAPACITY);
        Harness {
            task: ProseTask::new(base),
            sidelink_rx,
            bearer_rx,
            event_rx,
        }
    }

    fn announcement(source: u32, code: u32) -> Pc5Message {
        Pc5Message::DiscoveryAnnouncement(DiscoveryAnnouncement {
            source_l2_id: source,
            relay_code: code,
            sim_pos: Vector3::default(),
        })
    }

    fn next_sent(rx: &mut Receiver<TaskMessage<SidelinkTaskMessage>>) -> (Option<u32>, Pc5Message) {
        match rx.try_recv() {
            Ok(TaskMessage::Message(SidelinkTaskMessage::Pc5Send { dest_l2_id, msg })) => {
                (dest_l2_id, msg)
            }
            other => panic!("expected Pc5Send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_establishes_to_discovered_relay() {
        let mut h = make_task(1, DeviceRole::Remote);

        h.task
            .handle_pc5_delivery(announcement(10, 5), Some(-90.0))
            .await;

        assert_eq!(h.task.candidate_count(), 1);
        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(10));
        assert!(matches!(msg, Pc5Message::DirectLinkEstablishmentRequest(_)));
        assert_eq!(h.task.current_relay(), Some(10));

        // Accept arrives: link connected, data path activated
        h.task
            .handle_pc5_delivery(
                Pc5Message::DirectLinkEstablishmentAccept(DirectLinkEstablishmentAccept {
                    source_l2_id: 10,
                    target_l2_id: 1,
                    relay_code: 5,
                }),
                None,
            )
            .await;

        assert_eq!(
            h.task.links.get(&10).map(|l| l.state()),
            Some(DirectLinkState::Connected)
        );
        assert_eq!(
            h.bearer_rx.try_recv().unwrap(),
            BearerMessage::ActivateDataPath {
                peer_l2_id: 10,
                relay_code: 5
            }
        );

        let mut saw_discovered = false;
        let mut saw_selected = false;
        let mut saw_established = false;
        while let Ok(event) = h.event_rx.try_recv() {
            match event {
                ProseEvent::RelayDiscovered { relay_l2_id: 10, .. } => saw_discovered = true,
                ProseEvent::RelaySelected {
                    selected_relay_l2_id: 10,
                    current_relay_l2_id: None,
                    ..
                } => saw_selected = true,
                ProseEvent::LinkEstablished { peer_l2_id: 10, .. } => saw_established = true,
                _ => {}
            }
        }
        assert!(saw_discovered && saw_selected && saw_established);
    }

    #[tokio::test]
    async fn test_switch_releases_before_establishing() {
        let mut h = make_task(1, DeviceRole::Remote);

        // Connect to relay 10
        h.task
            .handle_pc5_delivery(announcement(10, 5), Some(-90.0))
            .await;
        let _ = next_sent(&mut h.sidelink_rx);
        h.task
            .handle_pc5_delivery(
                Pc5Message::DirectLinkEstablishmentAccept(DirectLinkEstablishmentAccept {
                    source_l2_id: 10,
                    target_l2_id: 1,
                    relay_code: 5,
                }),
                None,
            )
            .await;

        // Stronger relay 20 appears: the switch starts with a release
        h.task
            .handle_pc5_delivery(announcement(20, 5), Some(-60.0))
            .await;

        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(10));
        assert!(matches!(msg, Pc5Message::DirectLinkReleaseRequest(_)));
        assert_eq!(
            h.task.links.get(&10).map(|l| l.state()),
            Some(DirectLinkState::Releasing)
        );
        // No establishment toward 20 before the release completes
        assert!(h.sidelink_rx.try_recv().is_err());
        assert_eq!(h.task.current_relay(), None);

        // Release acknowledged: only now the new establishment starts
        h.task
            .handle_pc5_delivery(
                Pc5Message::DirectLinkReleaseAccept(DirectLinkReleaseAccept {
                    source_l2_id: 10,
                    target_l2_id: 1,
                    relay_code: 5,
                }),
                None,
            )
            .await;

        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(20));
        assert!(matches!(msg, Pc5Message::DirectLinkEstablishmentRequest(_)));
        assert_eq!(h.task.current_relay(), Some(20));
        assert!(h.task.links.get(&10).is_none());

        // Data path toward 10 was torn down
        assert_eq!(
            h.bearer_rx.try_recv().unwrap(),
            BearerMessage::ActivateDataPath {
                peer_l2_id: 10,
                relay_code: 5
            }
        );
        assert_eq!(
            h.bearer_rx.try_recv().unwrap(),
            BearerMessage::DeactivateDataPath {
                peer_l2_id: 10,
                relay_code: 5
            }
        );
    }

    #[tokio::test]
    async fn test_weaker_relay_does_not_trigger_switch() {
        let mut h = make_task(1, DeviceRole::Remote);

        h.task
            .handle_pc5_delivery(announcement(10, 5), Some(-80.0))
            .await;
        let _ = next_sent(&mut h.sidelink_rx);

        // Weaker relay appears: selection sticks with the current one
        h.task
            .handle_pc5_delivery(announcement(20, 5), Some(-95.0))
            .await;

        assert_eq!(h.task.current_relay(), Some(10));
        assert!(h.sidelink_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relay_accepts_matching_establishment_request() {
        let mut h = make_task(10, DeviceRole::Relay);

        h.task.handle_establishment_request(1, 5).await;

        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(1));
        assert!(matches!(msg, Pc5Message::DirectLinkEstablishmentAccept(_)));
        assert_eq!(
            h.task.links.get(&1).map(|l| l.state()),
            Some(DirectLinkState::Connected)
        );
        assert_eq!(
            h.bearer_rx.try_recv().unwrap(),
            BearerMessage::ActivateDataPath {
                peer_l2_id: 1,
                relay_code: 5
            }
        );
    }

    #[tokio::test]
    async fn test_relay_serves_multiple_remotes() {
        let mut h = make_task(10, DeviceRole::Relay);

        h.task.handle_establishment_request(1, 5).await;
        h.task.handle_establishment_request(2, 5).await;

        assert_eq!(h.task.links.len(), 2);
        assert!(h.task.links.values().all(|l| l.state() == DirectLinkState::Connected));
    }

    #[tokio::test]
    async fn test_establishment_request_with_wrong_code_rejected() {
        let mut h = make_task(10, DeviceRole::Relay);

        h.task.handle_establishment_request(1, 6).await;

        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(1));
        assert!(matches!(msg, Pc5Message::DirectLinkEstablishmentReject(_)));
        assert!(h.task.links.is_empty());
    }

    #[tokio::test]
    async fn test_remote_rejects_relay_service_request() {
        let mut h = make_task(1, DeviceRole::Remote);

        h.task.handle_establishment_request(2, 5).await;

        let (_, msg) = next_sent(&mut h.sidelink_rx);
        assert!(matches!(msg, Pc5Message::DirectLinkEstablishmentReject(_)));
    }

    #[tokio::test]
    async fn test_stray_release_accept_reports_violation() {
        let mut h = make_task(1, DeviceRole::Remote);

        h.task
            .handle_pc5_delivery(
                Pc5Message::DirectLinkReleaseAccept(DirectLinkReleaseAccept {
                    source_l2_id: 99,
                    target_l2_id: 1,
                    relay_code: 5,
                }),
                None,
            )
            .await;

        let mut saw_violation = false;
        while let Ok(event) = h.event_rx.try_recv() {
            if matches!(event, ProseEvent::ProtocolViolation { peer_l2_id: 99, .. }) {
                saw_violation = true;
            }
        }
        assert!(saw_violation);
    }

    #[tokio::test]
    async fn test_release_request_for_unknown_link_acknowledged() {
        let mut h = make_task(1, DeviceRole::Remote);

        h.task.handle_release_request(42, 5).await;

        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(42));
        assert!(matches!(msg, Pc5Message::DirectLinkReleaseAccept(_)));
    }

    #[tokio::test]
    async fn test_relay_never_selects() {
        let mut h = make_task(10, DeviceRole::Relay);

        // A relay hearing another relay's announcement records nothing and
        // never initiates a link
        h.task
            .handle_pc5_delivery(announcement(11, 5), Some(-60.0))
            .await;

        assert_eq!(h.task.candidate_count(), 0);
        assert!(h.sidelink_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_explicit_release_link() {
        let mut h = make_task(1, DeviceRole::Remote);

        h.task
            .handle_pc5_delivery(announcement(10, 5), Some(-90.0))
            .await;
        let _ = next_sent(&mut h.sidelink_rx);

        h.task
            .handle_message(ProseTaskMessage::ReleaseLink {
                peer_l2_id: 10,
                cause: ReleaseCause::ExplicitDisconnect,
            })
            .await;

        let (dest, msg) = next_sent(&mut h.sidelink_rx);
        assert_eq!(dest, Some(10));
        assert!(
            matches!(msg, Pc5Message::DirectLinkReleaseRequest(m) if m.cause == ReleaseCause::ExplicitDisconnect)
        );
    }
}
