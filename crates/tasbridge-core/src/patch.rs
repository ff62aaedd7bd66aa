use serde_json::{Map, Value};

use crate::device::Power;

/// How a patch is merged into the device record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeKind {
    /// Last-will presence. Only `online` is written.
    Presence,
    /// Full telemetry snapshot. Carried fields are written and `online` is forced true.
    FullReplace,
    /// Command result or info fragment. Only carried fields are written.
    PartialReplace,
}

/// Field-level update. `None` means "not carried", never "clear".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceFields {
    pub power: Option<Power>,
    pub online: Option<bool>,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub module: Option<String>,
    pub version: Option<String>,
    pub restart_reason: Option<String>,
    pub boot_count: Option<u32>,
    pub dimmer: Option<u8>,
    pub color: Option<String>,
    pub hsb_color: Option<String>,
    pub ct: Option<u16>,
    pub wifi: Option<Map<String, Value>>,
}

impl DeviceFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A tagged update produced by the router or the command path.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    pub kind: MergeKind,
    pub fields: DeviceFields,
}

impl Patch {
    pub fn presence(online: bool) -> Self {
        Self {
            kind: MergeKind::Presence,
            fields: DeviceFields {
                online: Some(online),
                ..DeviceFields::default()
            },
        }
    }

    pub fn full(fields: DeviceFields) -> Self {
        Self {
            kind: MergeKind::FullReplace,
            fields,
        }
    }

    pub fn partial(fields: DeviceFields) -> Self {
        Self {
            kind: MergeKind::PartialReplace,
            fields,
        }
    }
}

/// Single-field speculative write issued right after a command is published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldPatch {
    Power(Power),
    ColorTemperature(u16),
    Dimmer(u8),
    HsbColor(String),
}

impl From<FieldPatch> for DeviceFields {
    fn from(patch: FieldPatch) -> Self {
        let mut fields = Self::default();
        match patch {
            FieldPatch::Power(p) => fields.power = Some(p),
            FieldPatch::ColorTemperature(ct) => fields.ct = Some(ct),
            FieldPatch::Dimmer(d) => fields.dimmer = Some(d),
            FieldPatch::HsbColor(hsb) => fields.hsb_color = Some(hsb),
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_carries_only_online() {
        let patch = Patch::presence(false);
        assert_eq!(patch.kind, MergeKind::Presence);
        assert_eq!(patch.fields.online, Some(false));
        assert!(patch.fields.power.is_none());
    }

    #[test]
    fn field_patch_sets_exactly_one_field() {
        let fields = DeviceFields::from(FieldPatch::Dimmer(0));
        assert_eq!(fields.dimmer, Some(0));
        assert_eq!(
            DeviceFields {
                dimmer: None,
                ..fields
            },
            DeviceFields::default()
        );
    }

    #[test]
    fn empty_fields() {
        assert!(DeviceFields::default().is_empty());
        assert!(!DeviceFields::from(FieldPatch::Power(Power::On)).is_empty());
    }
}
