use std::time::Duration;

use rumqttc::{MqttOptions, Transport};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

/// Requests (publishes, subscribes) buffered while the broker is unreachable.
pub const DEFAULT_REQUEST_CAPACITY: usize = 64;

/// Broker connection parameters, resolved from settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Fixed delay between reconnect attempts. No backoff is applied.
    pub reconnect_period: Duration,
    pub request_capacity: usize,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: true,
            username: None,
            password: None,
            client_id: generated_client_id(),
            keep_alive: Duration::from_secs(60),
            reconnect_period: Duration::from_millis(5000),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_credentials(
        mut self,
        username: Option<String>,
        password: Option<SecretString>,
    ) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Blank ids are ignored and the generated id is kept.
    pub fn with_client_id(mut self, client_id: Option<&str>) -> Self {
        if let Some(id) = client_id.map(str::trim).filter(|id| !id.is_empty()) {
            self.client_id = id.to_string();
        }
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_reconnect_period(mut self, period: Duration) -> Self {
        self.reconnect_period = period;
        self
    }

    pub(crate) fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            let password = self
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            options.set_credentials(username.clone(), password);
        }
        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

/// `tasbridge_` followed by the random tail of a v7 UUID.
pub fn generated_client_id() -> String {
    let id = Uuid::now_v7().simple().to_string();
    format!("tasbridge_{}", &id[id.len() - 8..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let a = generated_client_id();
        let b = generated_client_id();
        assert!(a.starts_with("tasbridge_"));
        assert_eq!(a.len(), "tasbridge_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn blank_client_id_keeps_generated() {
        let config = SessionConfig::new("broker.local", 8883).with_client_id(Some("   "));
        assert!(config.client_id.starts_with("tasbridge_"));

        let config = config.with_client_id(Some("lamp-bridge"));
        assert_eq!(config.client_id, "lamp-bridge");
    }

    #[test]
    fn options_carry_keep_alive_and_credentials() {
        let config = SessionConfig::new("broker.local", 1883)
            .with_tls(false)
            .with_keep_alive(Duration::from_secs(30))
            .with_credentials(Some("user".into()), Some(SecretString::from("pw".to_string())));
        let options = config.mqtt_options();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), "pw".to_string()))
        );
    }

    #[test]
    fn debug_redacts_password() {
        let config = SessionConfig::new("broker.local", 8883)
            .with_credentials(Some("user".into()), Some(SecretString::from("hunter2".to_string())));
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
