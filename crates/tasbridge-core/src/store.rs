use tracing::{info, warn};

use crate::device::DeviceState;
use crate::patch::{DeviceFields, FieldPatch, MergeKind, Patch};

/// Owner of the one `DeviceState` in the process.
///
/// Not synchronized: the bridge event loop holds it by value and applies
/// every write in arrival order.
#[derive(Debug, Default)]
pub struct StateStore {
    state: DeviceState,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: DeviceState) -> Self {
        Self { state }
    }

    pub fn apply_patch(&mut self, patch: Patch) {
        match patch.kind {
            MergeKind::Presence => {
                let Some(online) = patch.fields.online else {
                    return;
                };
                if online {
                    if !self.state.online {
                        info!("Device is online");
                    }
                } else {
                    warn!(was_online = self.state.online, "Device went offline (LWT)");
                }
                self.state.online = online;
            }
            MergeKind::FullReplace => {
                self.merge(patch.fields);
                self.state.online = true;
            }
            MergeKind::PartialReplace => self.merge(patch.fields),
        }
    }

    /// Speculative write after a command is published. Later telemetry for
    /// the same field simply overwrites it.
    pub fn apply_optimistic(&mut self, patch: FieldPatch) {
        self.merge(patch.into());
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.clone()
    }

    pub fn current(&self) -> &DeviceState {
        &self.state
    }

    fn merge(&mut self, fields: DeviceFields) {
        let s = &mut self.state;
        if let Some(v) = fields.power {
            s.power = v;
        }
        if let Some(v) = fields.online {
            s.online = v;
        }
        if let Some(v) = fields.ip {
            s.ip = v;
        }
        if let Some(v) = fields.hostname {
            s.hostname = v;
        }
        if let Some(v) = fields.module {
            s.module = v;
        }
        if let Some(v) = fields.version {
            s.version = v;
        }
        if let Some(v) = fields.restart_reason {
            s.restart_reason = v;
        }
        if let Some(v) = fields.boot_count {
            s.boot_count = v;
        }
        if let Some(v) = fields.dimmer {
            s.dimmer = v;
        }
        if let Some(v) = fields.color {
            s.color = v;
        }
        if let Some(v) = fields.hsb_color {
            s.hsb_color = v;
        }
        if let Some(v) = fields.ct {
            s.ct = v;
        }
        if let Some(v) = fields.wifi {
            s.wifi = v;
        }
    }
}
