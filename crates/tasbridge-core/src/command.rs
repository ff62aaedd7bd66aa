use std::fmt;

use crate::device::{DeviceState, Power};
use crate::errors::{PublishError, ValidationError};
use crate::patch::FieldPatch;

fn bounded(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// Color temperature in mireds, 153 (cold) to 500 (warm).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorTemperature(u16);

impl ColorTemperature {
    pub const MIN: i64 = 153;
    pub const MAX: i64 = 500;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        let v = bounded("ct", value, Self::MIN, Self::MAX)?;
        Ok(Self(v as u16))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Brightness percentage, 0 to 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimmer(u8);

impl Dimmer {
    pub const MAX: i64 = 100;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        let v = bounded("dimmer", value, 0, Self::MAX)?;
        Ok(Self(v as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Hue (0-360), saturation and brightness (0-100).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsb {
    hue: u16,
    saturation: u8,
    brightness: u8,
}

impl Hsb {
    pub fn new(hue: i64, saturation: i64, brightness: i64) -> Result<Self, ValidationError> {
        let hue = bounded("hue", hue, 0, 360)?;
        let saturation = bounded("saturation", saturation, 0, 100)?;
        let brightness = bounded("dimmer", brightness, 0, 100)?;
        Ok(Self {
            hue: hue as u16,
            saturation: saturation as u8,
            brightness: brightness as u8,
        })
    }
}

impl fmt::Display for Hsb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.hue, self.saturation, self.brightness)
    }
}

/// Firmware command names, used as the last segment of `cmnd/<topic>/<name>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandName {
    Power,
    ColorTemperature,
    Dimmer,
    HsbColor,
}

impl CommandName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "POWER",
            Self::ColorTemperature => "CT",
            Self::Dimmer => "Dimmer",
            Self::HsbColor => "HSBColor",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound instruction, published once and never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub name: CommandName,
    pub value: String,
}

impl Command {
    pub fn new(name: CommandName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// A validated control request waiting to run on the bridge event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    TogglePower,
    SetColorTemperature(ColorTemperature),
    SetDimmer(Dimmer),
    SetHsb(Hsb),
}

impl ControlCommand {
    /// The command to publish and the optimistic write that mirrors it.
    ///
    /// `TogglePower` reads the current power from `current`, so this must run
    /// against the live record, not a stale snapshot.
    pub fn resolve(self, current: &DeviceState) -> (Command, FieldPatch) {
        match self {
            Self::TogglePower => {
                let next: Power = current.power.toggled();
                (
                    Command::new(CommandName::Power, next.as_str()),
                    FieldPatch::Power(next),
                )
            }
            Self::SetColorTemperature(ct) => (
                Command::new(CommandName::ColorTemperature, ct.get().to_string()),
                FieldPatch::ColorTemperature(ct.get()),
            ),
            Self::SetDimmer(d) => (
                Command::new(CommandName::Dimmer, d.get().to_string()),
                FieldPatch::Dimmer(d.get()),
            ),
            Self::SetHsb(hsb) => {
                let triple = hsb.to_string();
                (
                    Command::new(CommandName::HsbColor, triple.clone()),
                    FieldPatch::HsbColor(triple),
                )
            }
        }
    }
}

/// Outbound seam to the broker session.
///
/// Implementations must not block: the bridge event loop calls this between
/// reading and writing the device record.
pub trait CommandPublisher: Send + Sync {
    fn publish(&self, command: &Command) -> Result<(), PublishError>;
}
