//! MQTT session for the bridge, built on `rumqttc`.
//!
//! [`SessionManager`] owns the connection and forwards inbound publishes to
//! the bridge event loop; [`SessionHandle`] is the [`CommandPublisher`]
//! handed to that loop for outbound commands.
//!
//! [`CommandPublisher`]: tasbridge_core::CommandPublisher

pub mod config;
pub mod session;

pub use config::{generated_client_id, SessionConfig, DEFAULT_REQUEST_CAPACITY};
pub use session::{ConnectionState, SessionError, SessionHandle, SessionManager};
