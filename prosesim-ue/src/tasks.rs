//! Device Task Framework
//!
//! This module implements the actor-based task model with message passing
//! for a ProSe device. Each task runs as an independent async task and
//! communicates via typed message channels.
//!
//! # Architecture
//!
//! A device runs two tasks:
//! - **ProSe Task**: relay discovery, selection, and direct-link management
//! - **Sidelink Task**: PC5 message transport over UDP, RSRP derivation
//!
//! Both tasks drain their own channel in FIFO order, which is what the
//! handshake retransmission logic relies on to never observe a stale state
//! for its own device.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use prosesim_common::config::DeviceConfig;
use prosesim_pc5::{Pc5Message, ReleaseCause};

use crate::prose::ProseEvent;

// ============================================================================
// Task Message Envelope
// ============================================================================

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Creates a new message envelope containing the given payload.
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    /// Creates a shutdown signal.
    pub fn shutdown() -> Self {
        TaskMessage::Shutdown
    }

    /// Returns true if this is a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

// ============================================================================
// Task Identifiers
// ============================================================================

/// Task identifier for the device tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// ProSe layer task
    Prose,
    /// Sidelink transport task
    Sidelink,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Prose => write!(f, "ProSe"),
            TaskId::Sidelink => write!(f, "Sidelink"),
        }
    }
}

// ============================================================================
// Task Trait
// ============================================================================

/// Base trait for device tasks.
///
/// Tasks are async actors that process messages from their receive channel
/// until a `TaskMessage::Shutdown` arrives.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop, processing messages until shutdown.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

// ============================================================================
// ProSe Task Messages
// ============================================================================

/// Messages for the ProSe task.
#[derive(Debug)]
pub enum ProseTaskMessage {
    /// PC5-S message received over the sidelink (from Sidelink task)
    Pc5Delivery {
        /// The decoded message
        msg: Pc5Message,
        /// Raw RSRP sample derived by the sidelink for messages carrying a
        /// position; None for link signalling messages
        rsrp_dbm: Option<f64>,
    },
    /// Release a direct link (explicit disconnect or lower-layer failure)
    ReleaseLink {
        /// Peer L2 identifier of the link to release
        peer_l2_id: u32,
        /// Release cause to signal
        cause: ReleaseCause,
    },
    /// Force a relay reselection evaluation outside the periodic tick
    TriggerReselection,
}

// ============================================================================
// Sidelink Task Messages
// ============================================================================

/// Messages for the Sidelink task.
#[derive(Debug)]
pub enum SidelinkTaskMessage {
    /// Transmit a PC5-S message (from ProSe task)
    Pc5Send {
        /// Destination L2 identifier; None broadcasts to the peer search list
        dest_l2_id: Option<u32>,
        /// The message to encode and send
        msg: Pc5Message,
    },
}

// ============================================================================
// Bearer Messages
// ============================================================================

/// Data-path control messages toward the bearer collaborator.
///
/// Emitted when a relay direct link reaches `Connected` (activate) or leaves
/// it (deactivate) so the networking layer can start or stop forwarding user
/// traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerMessage {
    /// Start forwarding user traffic over the relay link
    ActivateDataPath {
        /// Peer L2 identifier of the link
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
    /// Stop forwarding user traffic over the relay link
    DeactivateDataPath {
        /// Peer L2 identifier of the link
        peer_l2_id: u32,
        /// Relay service code of the link
        relay_code: u32,
    },
}

// ============================================================================
// Task Handle
// ============================================================================

/// Handle for sending messages to a task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Creates a new task handle from a sender.
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Sends a message to the task.
    ///
    /// Returns an error if the task has been dropped.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends a message to the task without waiting.
    pub fn try_send(&self, msg: T) -> Result<(), mpsc::error::TrySendError<TaskMessage<T>>> {
        self.tx.try_send(TaskMessage::Message(msg))
    }

    /// Sends a shutdown signal to the task.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    /// Returns true if the task channel is closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Device Task Base
// ============================================================================

/// Default channel capacity for task message queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Base structure containing all task handles for a device.
///
/// Shared among tasks for inter-task communication. The event channel is
/// unbounded so the core never blocks on observers; the bearer channel is
/// drained by the scenario harness or binary.
#[derive(Clone)]
pub struct DeviceTaskBase {
    /// Device configuration
    pub config: Arc<DeviceConfig>,
    /// Handle to the ProSe task
    pub prose_tx: TaskHandle<ProseTaskMessage>,
    /// Handle to the Sidelink task
    pub sidelink_tx: TaskHandle<SidelinkTaskMessage>,
    /// Data-path control channel toward the bearer collaborator
    pub bearer_tx: mpsc::Sender<BearerMessage>,
    /// Observability event stream
    pub event_tx: mpsc::UnboundedSender<ProseEvent>,
}

impl DeviceTaskBase {
    /// Creates a new DeviceTaskBase with the given configuration.
    ///
    /// Returns the task base along with the receivers for each channel.
    pub fn new(
        config: DeviceConfig,
        channel_capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<TaskMessage<ProseTaskMessage>>,
        mpsc::Receiver<TaskMessage<SidelinkTaskMessage>>,
        mpsc::Receiver<BearerMessage>,
        mpsc::UnboundedReceiver<ProseEvent>,
    ) {
        let (prose_tx, prose_rx) = mpsc::channel(channel_capacity);
        let (sidelink_tx, sidelink_rx) = mpsc::channel(channel_capacity);
        let (bearer_tx, bearer_rx) = mpsc::channel(channel_capacity);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let base = Self {
            config: Arc::new(config),
            prose_tx: TaskHandle::new(prose_tx),
            sidelink_tx: TaskHandle::new(sidelink_tx),
            bearer_tx,
            event_tx,
        };

        (base, prose_rx, sidelink_rx, bearer_rx, event_rx)
    }

    /// Emits an observability event without blocking.
    ///
    /// A dropped or closed observer never stalls the core.
    pub fn emit_event(&self, event: ProseEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Sends shutdown signals to all tasks.
    pub async fn shutdown_all(&self) {
        // Ignore errors - tasks may already be shut down
        let _ = self.prose_tx.shutdown().await;
        let _ = self.sidelink_tx.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
