//! Sidelink Task Implementation
//!
//! Carries PC5-S messages between devices over UDP. A sidelink broadcast is
//! emulated by sending the datagram to every address in the peer search
//! list; unicast destinations are resolved from addresses learned off
//! received traffic.
//!
//! For messages that carry the sender's simulated position, the task derives
//! a raw RSRP sample with a log-distance pathloss model before handing the
//! message to the ProSe task. The channel is lossy best-effort; nothing is
//! retransmitted here.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use prosesim_common::UdpTransport;
use prosesim_pc5::{codec, Pc5Message, Vector3};

use crate::tasks::{DeviceTaskBase, ProseTaskMessage, SidelinkTaskMessage, Task, TaskMessage};

/// Default UDP port for the PC5 sidelink
pub const DEFAULT_PC5_PORT: u16 = 4998;

/// Transmit power assumed for all devices (dBm)
const TX_POWER_DBM: f64 = 23.0;
/// Pathloss at the 1 m reference distance (dB)
const REFERENCE_PATHLOSS_DB: f64 = 38.5;
/// Log-distance pathloss exponent
const PATHLOSS_EXPONENT: f64 = 3.0;

/// Derives a raw RSRP sample from the simulated positions of receiver and
/// sender.
pub fn compute_rsrp_dbm(local_pos: Vector3, peer_pos: Vector3) -> f64 {
    let distance = local_pos.distance_to(&peer_pos).max(1.0);
    TX_POWER_DBM - (REFERENCE_PATHLOSS_DB + 10.0 * PATHLOSS_EXPONENT * distance.log10())
}

/// Sidelink task configuration
#[derive(Debug, Clone)]
pub struct SidelinkTaskConfig {
    /// Local bind address
    pub bind_address: SocketAddr,
    /// Addresses of the other devices in the scenario
    pub peer_search_list: Vec<SocketAddr>,
}

/// Sidelink transport task for one device.
pub struct SidelinkTask {
    task_base: DeviceTaskBase,
    config: SidelinkTaskConfig,
    local_pos: Vector3,
    peer_addresses: HashMap<u32, SocketAddr>,
    transport: Option<Arc<UdpTransport>>,
}

impl SidelinkTask {
    /// Creates the sidelink task from the device configuration.
    pub fn new(task_base: DeviceTaskBase) -> Self {
        let config = SidelinkTaskConfig {
            bind_address: task_base.config.bind_address,
            peer_search_list: task_base.config.peer_search_list.clone(),
        };
        let pos = task_base.config.sim_pos;

        Self {
            config,
            local_pos: Vector3::new(pos[0], pos[1], pos[2]),
            peer_addresses: HashMap::new(),
            transport: None,
            task_base,
        }
    }

    /// Number of peers with a learned address.
    pub fn known_peer_count(&self) -> usize {
        self.peer_addresses.len()
    }

    async fn init_transport(&mut self) -> Result<(), prosesim_common::Error> {
        let transport = UdpTransport::bind(self.config.bind_address).await?;
        info!("Sidelink task bound to {}", transport.local_addr()?);
        self.transport = Some(Arc::new(transport));
        Ok(())
    }

    async fn handle_pc5_send(&mut self, dest_l2_id: Option<u32>, msg: Pc5Message) {
        let Some(transport) = &self.transport else {
            return;
        };
        let data = codec::encode(&msg);

        match dest_l2_id {
            Some(l2_id) => match self.peer_addresses.get(&l2_id) {
                Some(addr) => {
                    debug!("TX {} -> L2 ID {}", msg.message_name(), l2_id);
                    if let Err(e) = transport.send_to(&data, *addr).await {
                        warn!("Failed to send PC5 message to {}: {}", addr, e);
                    }
                }
                None => warn!("No sidelink address known for L2 ID {}", l2_id),
            },
            None => {
                debug!(
                    "TX {} (broadcast to {} peers)",
                    msg.message_name(),
                    self.config.peer_search_list.len()
                );
                if let Err(e) = transport
                    .broadcast_to(&data, &self.config.peer_search_list)
                    .await
                {
                    warn!("Sidelink broadcast failed: {}", e);
                }
            }
        }
    }

    async fn handle_received_datagram(&mut self, data: &[u8], source: SocketAddr) {
        let msg = match codec::decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to decode PC5 message from {}: {}", source, e);
                return;
            }
        };

        // Learn or refresh the peer's sidelink address
        self.peer_addresses.insert(msg.source_l2_id(), source);

        let rsrp_dbm = msg
            .sim_pos()
            .map(|peer_pos| compute_rsrp_dbm(self.local_pos, peer_pos));

        debug!(
            "RX {} from L2 ID {} (rsrp={:?})",
            msg.message_name(),
            msg.source_l2_id(),
            rsrp_dbm
        );

        if self
            .task_base
            .prose_tx
            .send(ProseTaskMessage::Pc5Delivery { msg, rsrp_dbm })
            .await
            .is_err()
        {
            warn!("ProSe task unavailable, dropping received PC5 message");
        }
    }
}

#[async_trait::async_trait]
impl Task for SidelinkTask {
    type Message = SidelinkTaskMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("Sidelink task starting");
        if let Err(e) = self.init_transport().await {
            warn!("Failed to initialize sidelink transport: {}", e);
            return;
        }
        info!(
            "Sidelink task started with {} peers in search list",
            self.config.peer_search_list.len()
        );

        loop {
            let transport = self.transport.clone();
            tokio::select! {
                Some(msg) = rx.recv() => {
                    match msg {
                        TaskMessage::Message(SidelinkTaskMessage::Pc5Send { dest_l2_id, msg }) => {
                            self.handle_pc5_send(dest_l2_id, msg).await;
                        }
                        TaskMessage::Shutdown => {
                            info!("Sidelink task received shutdown signal");
                            break;
                        }
                    }
                }
                result = async {
                    match &transport {
                        Some(t) => t.recv_from().await.ok(),
                        None => None,
                    }
                } => {
                    if let Some((data, source)) = result {
                        self.handle_received_datagram(&data, source).await;
                    }
                }
            }
        }
        info!(
            "Sidelink task stopped with {} known peers",
            self.peer_addresses.len()
        );
    }
}
