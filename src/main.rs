//! # tasbridge
//!
//! Bridge binary: wires the MQTT session, the bridge event loop and the HTTP
//! control surface together.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use tasbridge_core::bridge::DEFAULT_QUEUE_DEPTH;
use tasbridge_core::{spawn_bridge, StateStore, Topics};
use tasbridge_mqtt::{SessionConfig, SessionManager};
use tasbridge_server::{AppState, CommandGateway, NamedTask, ServerConfig, ShutdownCoordinator};
use tasbridge_settings::{BridgeSettings, RequiredSettings};
use tasbridge_telemetry::{init_telemetry, TelemetryConfig};
use tracing::Level;

/// Tasmota MQTT to HTTP bridge.
#[derive(Parser, Debug)]
#[command(name = "tasbridge", about = "Tasmota MQTT to HTTP bridge")]
struct Cli {
    /// JSON settings file (falls back to `TASBRIDGE_CONFIG`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// HTTP port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn apply(&self, settings: &mut BridgeSettings) {
        if let Some(host) = &self.host {
            settings.http.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.http.port = port;
        }
    }
}

/// A missing `.env` is normal; anything else (unreadable file, bad line) is
/// worth a warning.
fn dotenv_failure(result: &Result<PathBuf, dotenv::Error>) -> Option<&dotenv::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn session_config(settings: &BridgeSettings, required: &RequiredSettings) -> SessionConfig {
    let mqtt = &settings.mqtt;
    SessionConfig::new(required.mqtt_host.clone(), mqtt.port)
        .with_tls(mqtt.protocol.is_tls())
        .with_credentials(
            mqtt.username.clone(),
            mqtt.password.clone().map(SecretString::from),
        )
        .with_client_id(mqtt.client_id.as_deref())
        .with_keep_alive(Duration::from_secs(mqtt.keep_alive_secs))
        .with_reconnect_period(Duration::from_millis(mqtt.reconnect_period_ms))
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_result = dotenv::dotenv();
    let cli = Cli::parse();

    let mut settings =
        tasbridge_settings::load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    cli.apply(&mut settings);

    let telemetry = TelemetryConfig::from_level(&settings.logging.level, settings.logging.json)
        .context("Invalid LOG_LEVEL")?
        .with_module_level("rumqttc", Level::WARN);
    init_telemetry(&telemetry).context("Failed to initialize logging")?;
    if let Some(e) = dotenv_failure(&dotenv_result) {
        tracing::warn!(error = %e, "Failed to load .env file");
    }

    let required = match settings.validate() {
        Ok(required) => required,
        Err(e) => {
            tracing::error!(error = %e, "MQTT configuration is incomplete");
            return Err(e).context("Check MQTT_HOST, MQTT_TOPIC and TASMOTA_MAC");
        }
    };
    if settings.uses_default_api_key() {
        tracing::warn!("API_KEY is not set, using the built-in default key");
    }
    tracing::debug!(?settings, "Settings loaded");

    let topics = Topics::new(required.mqtt_topic.clone(), &required.device_mac);
    let coordinator = ShutdownCoordinator::new();

    // Broker session and the event loop that owns the device record
    let (session, session_handle) =
        SessionManager::new(&session_config(&settings, &required), topics.clone());
    let (bridge, bridge_task) = spawn_bridge(
        StateStore::new(),
        topics,
        Arc::new(session_handle.clone()),
        DEFAULT_QUEUE_DEPTH,
    );

    tracing::info!(
        host = %required.mqtt_host,
        port = settings.mqtt.port,
        protocol = ?settings.mqtt.protocol,
        "Connecting to MQTT broker"
    );
    let session_task = {
        let bridge = bridge.clone();
        let token = coordinator.token();
        tokio::spawn(async move {
            if let Err(e) = session.run(bridge, token).await {
                tracing::error!(error = %e, "MQTT session ended with error");
            }
        })
    };

    // HTTP control surface
    let gateway = CommandGateway::new(SecretString::from(settings.api_key.clone()), bridge);
    let state = AppState::new(gateway, session_handle.state());
    let server_config = ServerConfig {
        host: settings.http.host.clone(),
        port: settings.http.port,
    };
    let server = tasbridge_server::start(&server_config, state, coordinator.token())
        .await
        .context("Failed to bind HTTP server")?;

    tracing::info!("Bridge listening on http://{}", server.addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let aborted = coordinator
        .graceful_shutdown(
            vec![
                NamedTask::new("http", server.task),
                NamedTask::new("mqtt", session_task),
                NamedTask::new("bridge", bridge_task),
            ],
            None,
        )
        .await;
    if aborted.is_empty() {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}
