//! The single logical thread of control.
//!
//! One task owns the [`StateStore`] and drains one channel carrying inbound
//! broker messages, control commands and snapshot requests. Requests are
//! handled strictly in arrival order, so an optimistic write and a telemetry
//! message touching the same field resolve as last-processed-wins.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::command::{CommandPublisher, ControlCommand};
use crate::device::DeviceState;
use crate::errors::BridgeError;
use crate::router;
use crate::store::StateStore;
use crate::topics::Topics;

/// Default depth of the bridge request queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// A raw message delivered by the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

enum BridgeRequest {
    Inbound(InboundMessage),
    Control {
        command: ControlCommand,
        reply: oneshot::Sender<DeviceState>,
    },
    Snapshot {
        reply: oneshot::Sender<DeviceState>,
    },
}

/// Cloneable entry point into the bridge event loop.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeRequest>,
}

impl BridgeHandle {
    /// Queue a broker message for routing.
    pub async fn ingest(&self, message: InboundMessage) -> Result<(), BridgeError> {
        self.tx
            .send(BridgeRequest::Inbound(message))
            .await
            .map_err(|_| BridgeError::Stopped)
    }

    /// Publish a validated command and apply its optimistic write. Resolves
    /// with the post-write snapshot; never waits for the broker.
    pub async fn execute(&self, command: ControlCommand) -> Result<DeviceState, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BridgeRequest::Control { command, reply })
            .await
            .map_err(|_| BridgeError::Stopped)?;
        rx.await.map_err(|_| BridgeError::Stopped)
    }

    pub async fn snapshot(&self) -> Result<DeviceState, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BridgeRequest::Snapshot { reply })
            .await
            .map_err(|_| BridgeError::Stopped)?;
        rx.await.map_err(|_| BridgeError::Stopped)
    }
}

/// Start the event loop. It runs until every [`BridgeHandle`] is dropped.
pub fn spawn_bridge(
    store: StateStore,
    topics: Topics,
    publisher: Arc<dyn CommandPublisher>,
    queue_depth: usize,
) -> (BridgeHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_depth);
    let task = tokio::spawn(run(rx, store, topics, publisher));
    (BridgeHandle { tx }, task)
}

async fn run(
    mut rx: mpsc::Receiver<BridgeRequest>,
    mut store: StateStore,
    topics: Topics,
    publisher: Arc<dyn CommandPublisher>,
) {
    while let Some(request) = rx.recv().await {
        match request {
            BridgeRequest::Inbound(message) => handle_inbound(&mut store, &topics, &message),
            BridgeRequest::Control { command, reply } => {
                let snapshot = handle_control(&mut store, publisher.as_ref(), command);
                if reply.send(snapshot).is_err() {
                    debug!("Control requester went away before the reply");
                }
            }
            BridgeRequest::Snapshot { reply } => {
                if reply.send(store.snapshot()).is_err() {
                    debug!("Snapshot requester went away before the reply");
                }
            }
        }
    }
    info!("Bridge event loop stopped");
}

fn handle_inbound(store: &mut StateStore, topics: &Topics, message: &InboundMessage) {
    debug!(
        topic = %message.topic,
        payload = %String::from_utf8_lossy(&message.payload),
        "MQTT Rx"
    );
    match router::route(&message.topic, &message.payload, topics) {
        Ok(Some(patch)) => store.apply_patch(patch),
        Ok(None) => debug!(topic = %message.topic, "Ignoring message on untracked topic"),
        Err(e) => error!(topic = %message.topic, error = %e, "Error processing MQTT message"),
    }
}

fn handle_control(
    store: &mut StateStore,
    publisher: &dyn CommandPublisher,
    command: ControlCommand,
) -> DeviceState {
    let (outbound, optimistic) = command.resolve(store.current());
    if let Err(e) = publisher.publish(&outbound) {
        error!(
            command = %outbound.name,
            value = %outbound.value,
            error = %e,
            "Failed to publish command"
        );
    }
    store.apply_optimistic(optimistic);
    store.snapshot()
}
