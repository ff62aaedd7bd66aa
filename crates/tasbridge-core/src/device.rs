use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for text fields the device has not reported yet.
pub const UNKNOWN: &str = "N/A";

/// Relay power state as reported by the firmware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Power {
    On,
    #[default]
    Off,
}

impl Power {
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Power {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("on") {
            Ok(Self::On)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Self::Off)
        } else {
            Err(format!("unknown power value: {s}"))
        }
    }
}

/// The canonical record describing the appliance.
///
/// Serialized with the field names the dashboard reads from `/api/status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub power: Power,
    pub online: bool,
    pub ip: String,
    pub hostname: String,
    pub module: String,
    pub version: String,
    pub restart_reason: String,
    pub boot_count: u32,
    pub dimmer: u8,
    /// Comma-separated RGB triple. Display only, never commanded.
    pub color: String,
    /// Comma-separated hue,saturation,brightness triple.
    pub hsb_color: String,
    /// Color temperature in mireds.
    pub ct: u16,
    /// Free-form network quality record (RSSI, signal, link count...).
    pub wifi: Map<String, Value>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power: Power::Off,
            online: false,
            ip: UNKNOWN.into(),
            hostname: UNKNOWN.into(),
            module: UNKNOWN.into(),
            version: UNKNOWN.into(),
            restart_reason: UNKNOWN.into(),
            boot_count: 0,
            dimmer: 10,
            color: "0,0,0".into(),
            hsb_color: "0,0,0".into(),
            ct: 153,
            wifi: Map::new(),
        }
    }
}
