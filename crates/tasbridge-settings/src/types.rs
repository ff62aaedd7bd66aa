//! Settings shapes. JSON files use camelCase keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Shared key used when none is configured. A warning is logged at startup
/// while it is in use.
pub const DEFAULT_API_KEY: &str = "default-secret-key-please-change";

/// Root settings for the bridge.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeSettings {
    /// Shared secret required by every control request.
    pub api_key: String,
    pub http: HttpSettings,
    pub mqtt: MqttSettings,
    pub device: DeviceSettings,
    pub logging: LoggingSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.into(),
            http: HttpSettings::default(),
            mqtt: MqttSettings::default(),
            device: DeviceSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl fmt::Debug for BridgeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSettings")
            .field("api_key", &"[REDACTED]")
            .field("http", &self.http)
            .field("mqtt", &self.mqtt)
            .field("device", &self.device)
            .field("logging", &self.logging)
            .finish()
    }
}

impl BridgeSettings {
    pub fn uses_default_api_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }

    /// Check the values the bridge cannot run without and hand them back
    /// unwrapped. Every missing key is reported at once.
    pub fn validate(&self) -> Result<RequiredSettings> {
        let host = non_empty(self.mqtt.host.as_deref());
        let topic = non_empty(self.mqtt.topic.as_deref());
        let mac = non_empty(self.device.mac.as_deref());

        match (host, topic, mac) {
            (Some(host), Some(topic), Some(mac)) => Ok(RequiredSettings {
                mqtt_host: host.to_string(),
                mqtt_topic: topic.to_string(),
                device_mac: mac.to_string(),
            }),
            (host, topic, mac) => {
                let mut missing = Vec::new();
                if host.is_none() {
                    missing.push("MQTT_HOST");
                }
                if topic.is_none() {
                    missing.push("MQTT_TOPIC");
                }
                if mac.is_none() {
                    missing.push("TASMOTA_MAC");
                }
                Err(SettingsError::MissingRequired(missing))
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Values guaranteed present after [`BridgeSettings::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredSettings {
    pub mqtt_host: String,
    pub mqtt_topic: String,
    pub device_mac: String,
}

/// HTTP listener.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Broker transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttProtocol {
    Mqtt,
    #[default]
    Mqtts,
}

impl MqttProtocol {
    pub fn is_tls(self) -> bool {
        self == Self::Mqtts
    }
}

impl FromStr for MqttProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => Ok(Self::Mqtt),
            "mqtts" | "ssl" | "tls" => Ok(Self::Mqtts),
            other => Err(format!("unknown MQTT protocol: {other}")),
        }
    }
}

/// Broker connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MqttSettings {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub protocol: MqttProtocol,
    /// Device topic, the middle segment of `stat/<topic>/RESULT`.
    pub topic: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    /// Fixed delay between reconnect attempts.
    pub reconnect_period_ms: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: 8883,
            username: None,
            password: None,
            protocol: MqttProtocol::Mqtts,
            topic: None,
            client_id: None,
            keep_alive_secs: 60,
            reconnect_period_ms: 5000,
        }
    }
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("protocol", &self.protocol)
            .field("topic", &self.topic)
            .field("client_id", &self.client_id)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("reconnect_period_ms", &self.reconnect_period_ms)
            .finish()
    }
}

/// The appliance being bridged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceSettings {
    /// MAC address keying the discovery topic, as the firmware prints it.
    pub mac: Option<String>,
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
