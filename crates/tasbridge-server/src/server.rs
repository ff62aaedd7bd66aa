use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tasbridge_core::DeviceState;
use tasbridge_mqtt::ConnectionState;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::extract::{integer_field, ApiRequest};
use crate::gateway::CommandGateway;
use crate::health::{self, HealthResponse};

/// Listener configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CommandGateway>,
    pub broker: watch::Receiver<ConnectionState>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(gateway: CommandGateway, broker: watch::Receiver<ConnectionState>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            broker,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/login", post(login))
        .route("/status", get(status))
        .route("/control/power", post(control_power))
        .route("/control/ct", post(control_ct))
        .route("/control/dimmer", post(control_dimmer))
        .route("/control/hsb", post(control_hsb));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` fires. In-flight requests are drained.
pub async fn start(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Server listening");

    let task = tokio::spawn(async move {
        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
        if let Err(e) = served {
            tracing::error!(error = %e, "HTTP server failed");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        task,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub task: tokio::task::JoinHandle<()>,
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker = *state.broker.borrow();
    let device_online = match state.gateway.status().await {
        Ok(snapshot) => snapshot.online,
        Err(_) => false,
    };
    Json(health::health_check(state.start_time, broker, device_online))
}

/// POST /api/login
async fn login(State(state): State<AppState>, req: ApiRequest) -> Result<Json<Value>, ApiError> {
    state.gateway.login(req.key.as_deref())?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/status
async fn status(
    State(state): State<AppState>,
    req: ApiRequest,
) -> Result<Json<DeviceState>, ApiError> {
    state.gateway.authenticate(req.key.as_deref(), &req.origin)?;
    Ok(Json(state.gateway.status().await?))
}

/// POST /api/control/power
async fn control_power(
    State(state): State<AppState>,
    req: ApiRequest,
) -> Result<Json<DeviceState>, ApiError> {
    state.gateway.authenticate(req.key.as_deref(), &req.origin)?;
    Ok(Json(state.gateway.set_power().await?))
}

/// POST /api/control/ct
async fn control_ct(
    State(state): State<AppState>,
    req: ApiRequest,
) -> Result<Json<DeviceState>, ApiError> {
    state.gateway.authenticate(req.key.as_deref(), &req.origin)?;
    let value =
        integer_field(&req.body, "value").map_err(ApiError::validation("Invalid CT value"))?;
    Ok(Json(state.gateway.set_color_temperature(value).await?))
}

/// POST /api/control/dimmer
async fn control_dimmer(
    State(state): State<AppState>,
    req: ApiRequest,
) -> Result<Json<DeviceState>, ApiError> {
    state.gateway.authenticate(req.key.as_deref(), &req.origin)?;
    let value =
        integer_field(&req.body, "value").map_err(ApiError::validation("Invalid dimmer value"))?;
    Ok(Json(state.gateway.set_dimmer(value).await?))
}

/// POST /api/control/hsb
async fn control_hsb(
    State(state): State<AppState>,
    req: ApiRequest,
) -> Result<Json<DeviceState>, ApiError> {
    state.gateway.authenticate(req.key.as_deref(), &req.origin)?;
    let invalid = ApiError::validation;
    let hue = integer_field(&req.body, "hue").map_err(invalid("Invalid HSB values"))?;
    let saturation =
        integer_field(&req.body, "saturation").map_err(invalid("Invalid HSB values"))?;
    let brightness = integer_field(&req.body, "dimmer").map_err(invalid("Invalid HSB values"))?;
    Ok(Json(state.gateway.set_hsb(hue, saturation, brightness).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tasbridge_core::{
        spawn_bridge, Command, CommandPublisher, PublishError, StateStore, Topics,
    };
    use tower::ServiceExt;

    use super::*;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<Command>>,
    }

    impl CommandPublisher for RecordingPublisher {
        fn publish(&self, command: &Command) -> Result<(), PublishError> {
            self.sent.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    fn make_router() -> (Router, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bridge, _task) = spawn_bridge(
            StateStore::new(),
            Topics::new("lamp", "AABBCCDDEEFF"),
            publisher.clone(),
            8,
        );
        let gateway = CommandGateway::new(SecretString::from("k3y".to_string()), bridge);
        let (_tx, broker) = watch::channel(ConnectionState::Connected);
        (build_router(AppState::new(gateway, broker)), publisher)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_broker_and_device() {
        let (app, _) = make_router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["broker"]["state"], "connected");
        assert_eq!(parsed["device_online"], false);
    }

    #[tokio::test]
    async fn login_accepts_and_rejects() {
        let (app, _) = make_router();
        let resp = app
            .clone()
            .oneshot(post_json("/api/login", json!({"apiKey": "k3y"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"success": true}));

        let resp = app
            .oneshot(post_json("/api/login", json!({"apiKey": "wrong"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(resp).await,
            json!({"success": false, "error": "Invalid API key"})
        );
    }

    #[tokio::test]
    async fn status_accepts_query_key() {
        let (app, _) = make_router();
        let req = Request::builder()
            .uri("/api/status?apiKey=k3y")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["power"], "OFF");
        assert_eq!(parsed["hsbColor"], "0,0,0");
    }

    #[tokio::test]
    async fn auth_is_checked_before_validation() {
        let (app, publisher) = make_router();
        let resp = app
            .oneshot(post_json("/api/control/ct", json!({"value": 9999})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn float_value_is_rejected() {
        let (app, publisher) = make_router();
        let resp = app
            .oneshot(post_json(
                "/api/control/dimmer",
                json!({"apiKey": "k3y", "value": 50.5}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"], "Invalid dimmer value: value must be an integer");
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (app, _) = make_router();
        let req = Request::builder()
            .uri("/api/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
