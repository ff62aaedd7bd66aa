//! Broker session: one connection, resubscribed on every CONNACK, retried on
//! a fixed period for as long as the process runs.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ClientError, Event, EventLoop, Outgoing, Packet, QoS, SubscribeFilter,
    SubscribeReasonCode,
};
use tasbridge_core::{BridgeHandle, Command, CommandPublisher, InboundMessage, PublishError, Topics};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;

/// Upper bound on flushing the DISCONNECT packet during shutdown.
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Broker connection status, published on a watch channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("broker client request failed: {0}")]
    Client(#[from] ClientError),

    #[error("broker rejected {rejected} subscription(s)")]
    SubscriptionRejected { rejected: usize },
}

/// Owns the rumqttc event loop. Consumed by [`SessionManager::run`].
pub struct SessionManager {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: Topics,
    reconnect_period: Duration,
    state_tx: watch::Sender<ConnectionState>,
}

/// Cloneable publishing side of the session.
#[derive(Clone)]
pub struct SessionHandle {
    client: AsyncClient,
    topics: Topics,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SessionManager {
    /// Build the client without connecting. The first connection attempt
    /// happens when [`run`](Self::run) starts polling.
    pub fn new(config: &SessionConfig, topics: Topics) -> (Self, SessionHandle) {
        let (client, eventloop) = AsyncClient::new(config.mqtt_options(), config.request_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let handle = SessionHandle {
            client: client.clone(),
            topics: topics.clone(),
            state_rx,
        };
        let manager = Self {
            client,
            eventloop,
            topics,
            reconnect_period: config.reconnect_period,
            state_tx,
        };
        (manager, handle)
    }

    /// Drive the connection until `shutdown` fires or the bridge stops.
    /// Every inbound publish is forwarded to `bridge` in delivery order.
    pub async fn run(
        mut self,
        bridge: BridgeHandle,
        shutdown: CancellationToken,
    ) -> Result<(), SessionError> {
        let filters = self.topics.subscriptions();
        let mut attempt: u32 = 0;

        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    attempt = 0;
                    info!("Connected to MQTT broker");
                    self.set_state(ConnectionState::Connected);
                    if let Err(e) = self.subscribe(&filters) {
                        error!(error = %e, "Subscription error");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                    if bridge.ingest(message).await.is_err() {
                        warn!("Bridge event loop stopped, closing MQTT session");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let rejected = ack
                        .return_codes
                        .iter()
                        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                        .count();
                    if rejected > 0 {
                        let e = SessionError::SubscriptionRejected { rejected };
                        error!(error = %e, "Subscription error");
                    } else {
                        info!(topics = %filters.join(", "), "Subscribed to topics");
                    }
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    debug!(pkid = ack.pkid, "Publish acknowledged");
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("MQTT connection closed by broker");
                }
                Ok(_) => {}
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    warn!(error = %e, attempt, "MQTT connection closed");
                    self.set_state(ConnectionState::Reconnecting { attempt });
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.reconnect_period) => {}
                    }
                    debug!(attempt, "Reconnecting to MQTT broker");
                }
            }
        }

        let was_connected = self.state_tx.borrow().is_connected();
        self.set_state(ConnectionState::Disconnected);
        if was_connected {
            self.disconnect().await?;
        }
        info!("MQTT session stopped");
        Ok(())
    }

    fn subscribe(&self, filters: &[String]) -> Result<(), SessionError> {
        let filters = filters
            .iter()
            .map(|f| SubscribeFilter::new(f.clone(), QoS::AtLeastOnce));
        self.client.try_subscribe_many(filters)?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.client.try_disconnect()?;
        let eventloop = &mut self.eventloop;
        let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            warn!("Timed out sending MQTT DISCONNECT");
        }
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

impl SessionHandle {
    /// Watch the connection status.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }
}

impl CommandPublisher for SessionHandle {
    /// Queue the command at QoS 1. While the broker is unreachable the
    /// request waits in the client queue until the next connection.
    fn publish(&self, command: &Command) -> Result<(), PublishError> {
        if self.state_rx.has_changed().is_err() {
            return Err(PublishError::Closed);
        }
        let topic = self.topics.command(command.name);
        self.client
            .try_publish(
                topic.as_str(),
                QoS::AtLeastOnce,
                false,
                command.value.clone().into_bytes(),
            )
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        info!(topic = %topic, value = %command.value, "MQTT Tx");
        Ok(())
    }
}
