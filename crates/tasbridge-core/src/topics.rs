use crate::command::CommandName;

/// Topic layout for one device: `stat|tele|cmnd/<device>/<suffix>` plus the
/// MAC-keyed discovery path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    device: String,
    discovery: String,
}

impl Topics {
    pub fn new(device_topic: impl Into<String>, mac: &str) -> Self {
        Self {
            device: device_topic.into(),
            discovery: format!("tasmota/discovery/{mac}/config"),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn discovery(&self) -> &str {
        &self.discovery
    }

    /// Filters subscribed on every (re)connect.
    pub fn subscriptions(&self) -> [String; 3] {
        [
            format!("stat/{}/+", self.device),
            format!("tele/{}/+", self.device),
            self.discovery.clone(),
        ]
    }

    pub fn command(&self, name: CommandName) -> String {
        format!("cmnd/{}/{}", self.device, name.as_str())
    }
}
