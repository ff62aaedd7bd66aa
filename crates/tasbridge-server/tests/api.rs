//! End-to-end scenarios: broker messages in through the bridge, control
//! requests in through the router, commands out through the publisher.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tasbridge_core::{
    spawn_bridge, BridgeHandle, Command, CommandName, CommandPublisher, InboundMessage,
    PublishError, StateStore, Topics,
};
use tasbridge_mqtt::ConnectionState;
use tasbridge_server::{build_router, start, AppState, CommandGateway, ServerConfig, ShutdownCoordinator};
use tokio::sync::watch;
use tower::ServiceExt;

const KEY: &str = "integration-key";

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<Command>>,
}

impl RecordingPublisher {
    fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }
}

impl CommandPublisher for RecordingPublisher {
    fn publish(&self, command: &Command) -> Result<(), PublishError> {
        self.sent.lock().unwrap().push(command.clone());
        Ok(())
    }
}

struct Harness {
    app: Router,
    bridge: BridgeHandle,
    publisher: Arc<RecordingPublisher>,
    _broker_tx: watch::Sender<ConnectionState>,
}

impl Harness {
    fn new() -> Self {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bridge, _task) = spawn_bridge(
            StateStore::new(),
            Topics::new("lamp", "AABBCCDDEEFF"),
            publisher.clone(),
            32,
        );
        let gateway = CommandGateway::new(SecretString::from(KEY.to_string()), bridge.clone());
        let (broker_tx, broker_rx) = watch::channel(ConnectionState::Connected);
        Self {
            app: build_router(AppState::new(gateway, broker_rx)),
            bridge,
            publisher,
            _broker_tx: broker_tx,
        }
    }

    async fn mqtt(&self, topic: &str, payload: &str) {
        self.bridge
            .ingest(InboundMessage::new(topic, payload))
            .await
            .unwrap();
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(req).await
    }

    async fn status(&self) -> Value {
        let (code, body) = self.get(&format!("/api/status?apiKey={KEY}")).await;
        assert_eq!(code, StatusCode::OK);
        body
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let code = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        (code, serde_json::from_slice(&bytes).unwrap())
    }
}

#[tokio::test]
async fn state_telemetry_merges_over_known_fields() {
    let h = Harness::new();
    h.mqtt(
        "tele/lamp/INFO2",
        r#"{"Info2":{"Hostname":"lamp-1234","IPAddress":"192.168.1.40"}}"#,
    )
    .await;
    h.mqtt(
        "tele/lamp/STATE",
        r#"{"POWER":"ON","Dimmer":55,"UptimeSec":1200,"Wifi":{"RSSI":78}}"#,
    )
    .await;

    let state = h.status().await;
    assert_eq!(state["power"], "ON");
    assert_eq!(state["dimmer"], 55);
    assert_eq!(state["online"], true);
    assert_eq!(state["ip"], "192.168.1.40");
    assert_eq!(state["hostname"], "lamp-1234");
    assert_eq!(state["wifi"]["RSSI"], 78);
    assert!(state.get("UptimeSec").is_none());
}

#[tokio::test]
async fn lwt_controls_presence() {
    let h = Harness::new();
    h.mqtt("tele/lamp/LWT", "Online").await;
    assert_eq!(h.status().await["online"], true);

    h.mqtt("tele/lamp/LWT", "Offline").await;
    assert_eq!(h.status().await["online"], false);

    let (_, health) = h.get("/health").await;
    assert_eq!(health["device_online"], false);
}

#[tokio::test]
async fn power_toggles_relative_to_current_state_and_ignores_body() {
    let h = Harness::new();
    h.mqtt("stat/lamp/RESULT", r#"{"POWER":"ON"}"#).await;

    let (code, state) = h
        .post("/api/control/power", json!({"apiKey": KEY, "state": "ON"}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(state["power"], "OFF");
    assert_eq!(
        h.publisher.sent(),
        vec![Command::new(CommandName::Power, "OFF")]
    );
}

#[tokio::test]
async fn power_toggles_with_plain_text_body_and_query_key() {
    let h = Harness::new();
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/control/power?apiKey={KEY}"))
        .header("content-type", "text/plain")
        .body(Body::from("toggle"))
        .unwrap();

    let (code, state) = h.send(req).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(state["power"], "ON");
    assert_eq!(
        h.publisher.sent(),
        vec![Command::new(CommandName::Power, "ON")]
    );
}

#[tokio::test]
async fn color_temperature_is_range_checked() {
    let h = Harness::new();
    for bad in [152, 501] {
        let (code, body) = h
            .post("/api/control/ct", json!({"apiKey": KEY, "value": bad}))
            .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid CT value"));
    }
    assert_eq!(h.status().await["ct"], 153);
    assert!(h.publisher.sent().is_empty());

    let (code, state) = h
        .post("/api/control/ct", json!({"apiKey": KEY, "value": 300}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(state["ct"], 300);
    assert_eq!(h.status().await["ct"], 300);
    assert_eq!(
        h.publisher.sent(),
        vec![Command::new(CommandName::ColorTemperature, "300")]
    );
}

#[tokio::test]
async fn status_without_key_reveals_nothing() {
    let h = Harness::new();
    let (code, body) = h.get("/api/status").await;
    assert_eq!(code, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"success": false, "error": "Invalid API key"}));

    let (code, _) = h.get("/api/status?apiKey=wrong").await;
    assert_eq!(code, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn hsb_is_validated_and_formatted() {
    let h = Harness::new();
    let (code, _) = h
        .post(
            "/api/control/hsb",
            json!({"apiKey": KEY, "hue": 400, "saturation": 50, "dimmer": 50}),
        )
        .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(h.status().await["hsbColor"], "0,0,0");

    let (code, state) = h
        .post(
            "/api/control/hsb",
            json!({"key": KEY, "hue": 120, "saturation": 50, "dimmer": 50}),
        )
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(state["hsbColor"], "120,50,50");
    assert_eq!(
        h.publisher.sent(),
        vec![Command::new(CommandName::HsbColor, "120,50,50")]
    );
}

#[tokio::test]
async fn optimistic_dimmer_survives_unrelated_result() {
    let h = Harness::new();
    let (code, state) = h
        .post("/api/control/dimmer", json!({"apiKey": KEY, "value": 80}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(state["dimmer"], 80);
    assert_eq!(h.status().await["dimmer"], 80);

    h.mqtt("stat/lamp/RESULT", r#"{"CT":250}"#).await;
    let state = h.status().await;
    assert_eq!(state["dimmer"], 80);
    assert_eq!(state["ct"], 250);
}

#[tokio::test]
async fn discovery_fills_identity_fields() {
    let h = Harness::new();
    h.mqtt(
        "tasmota/discovery/AABBCCDDEEFF/config",
        r#"{"ip":"10.0.0.7","hn":"bulb","md":"Sonoff B1","sw":"13.2.0"}"#,
    )
    .await;
    h.mqtt("tasmota/discovery/001122334455/config", r#"{"ip":"10.0.0.99"}"#)
        .await;

    let state = h.status().await;
    assert_eq!(state["ip"], "10.0.0.7");
    assert_eq!(state["hostname"], "bulb");
    assert_eq!(state["module"], "Sonoff B1");
    assert_eq!(state["version"], "13.2.0");
}

#[tokio::test]
async fn served_over_tcp_with_graceful_shutdown() {
    let publisher: Arc<dyn CommandPublisher> = Arc::new(RecordingPublisher::default());
    let (bridge, _task) = spawn_bridge(
        StateStore::new(),
        Topics::new("lamp", "AABBCCDDEEFF"),
        publisher,
        8,
    );
    let gateway = CommandGateway::new(SecretString::from(KEY.to_string()), bridge);
    let (_broker_tx, broker_rx) = watch::channel(ConnectionState::Connecting);
    let coordinator = ShutdownCoordinator::new();

    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
    };
    let handle = start(&config, AppState::new(gateway, broker_rx), coordinator.token())
        .await
        .unwrap();
    assert!(handle.addr.port() > 0);

    let client = reqwest::Client::new();
    let base = format!("http://{}", handle.addr);

    let resp = client
        .post(format!("{base}/api/login"))
        .json(&json!({"apiKey": KEY}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{base}/api/control/dimmer"))
        .json(&json!({"apiKey": "nope", "value": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["broker"]["state"], "connecting");
    drop(client);

    coordinator.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle.task)
        .await
        .expect("server did not drain")
        .unwrap();
}
