//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;
use tasbridge_mqtt::ConnectionState;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    pub broker: BrokerHealth,
    /// Last known device presence.
    pub device_online: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerHealth {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_attempt: Option<u32>,
}

impl From<ConnectionState> for BrokerHealth {
    fn from(state: ConnectionState) -> Self {
        let reconnect_attempt = match state {
            ConnectionState::Reconnecting { attempt } => Some(attempt),
            _ => None,
        };
        Self {
            state: state.as_str(),
            reconnect_attempt,
        }
    }
}

pub fn health_check(
    start_time: Instant,
    broker: ConnectionState,
    device_online: bool,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        broker: broker.into(),
        device_online,
    }
}
