//! HTTP control surface for the bridge.
//!
//! Routes under `/api` authenticate with the shared key, validate input in
//! the [`CommandGateway`] and forward accepted commands to the bridge event
//! loop. `/health` is unauthenticated.

pub mod error;
pub mod extract;
pub mod gateway;
pub mod health;
pub mod server;
pub mod shutdown;

pub use error::ApiError;
pub use gateway::CommandGateway;
pub use health::{BrokerHealth, HealthResponse};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
pub use shutdown::{NamedTask, ShutdownCoordinator, DEFAULT_SHUTDOWN_TIMEOUT};
