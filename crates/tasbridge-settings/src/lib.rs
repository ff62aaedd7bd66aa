//! # tasbridge-settings
//!
//! Layered configuration for the bridge process.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **Settings file**: optional JSON named by `--config` or `TASBRIDGE_CONFIG`
//! 3. **Environment variables**: `MQTT_HOST`, `TASMOTA_MAC`, `API_KEY` and friends
//!
//! ```no_run
//! use tasbridge_settings::load_settings;
//!
//! let settings = load_settings(None).unwrap();
//! let required = settings.validate().unwrap();
//! println!("bridging {}", required.mqtt_topic);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
