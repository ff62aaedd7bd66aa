//! Device model, topic routing and the single-owner state store for the
//! Tasmota bridge.
//!
//! Inbound broker messages and HTTP control commands both flow through the
//! [`bridge`] event loop, which owns the one [`DeviceState`] in the process.

pub mod bridge;
pub mod command;
pub mod device;
pub mod errors;
pub mod patch;
pub mod router;
pub mod store;
pub mod topics;

pub use bridge::{spawn_bridge, BridgeHandle, InboundMessage};
pub use command::{
    ColorTemperature, Command, CommandName, CommandPublisher, ControlCommand, Dimmer, Hsb,
};
pub use device::{DeviceState, Power};
pub use errors::{BridgeError, PublishError, RouteError, ValidationError};
pub use patch::{DeviceFields, FieldPatch, MergeKind, Patch};
pub use store::StateStore;
pub use topics::Topics;
