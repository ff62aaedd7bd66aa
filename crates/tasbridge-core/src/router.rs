//! Pure classification of inbound broker messages into device patches.
//!
//! Each topic kind has an explicit key whitelist. Keys outside it are ignored,
//! and a whitelisted key with the wrong JSON type rejects the whole message so
//! the store never sees a half-built patch.

use serde_json::{Map, Value};

use crate::device::Power;
use crate::errors::RouteError;
use crate::patch::{DeviceFields, Patch};
use crate::topics::Topics;

/// Last-will body the firmware publishes while reachable.
pub const ONLINE_MARKER: &str = "Online";

/// What an inbound topic carries, in classification priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicKind {
    Lwt,
    State,
    Result,
    Info1,
    Info2,
    Info3,
    Discovery,
    Unknown,
}

pub fn classify(topic: &str, topics: &Topics) -> TopicKind {
    let suffix = topic.rsplit_once('/').map_or(topic, |(_, s)| s);
    match suffix {
        "LWT" => TopicKind::Lwt,
        "STATE" => TopicKind::State,
        "RESULT" => TopicKind::Result,
        "INFO1" => TopicKind::Info1,
        "INFO2" => TopicKind::Info2,
        "INFO3" => TopicKind::Info3,
        _ if topic == topics.discovery() => TopicKind::Discovery,
        _ => TopicKind::Unknown,
    }
}

#[derive(Debug)]
enum Payload {
    Object(Map<String, Value>),
    Text(String),
}

impl Payload {
    fn parse(raw: &[u8]) -> Result<Self, RouteError> {
        let text = String::from_utf8_lossy(raw);
        if text.starts_with('{') {
            Ok(Self::Object(serde_json::from_str(&text)?))
        } else {
            Ok(Self::Text(text.into_owned()))
        }
    }

    fn into_object(self) -> Result<Map<String, Value>, RouteError> {
        match self {
            Self::Object(map) => Ok(map),
            Self::Text(_) => Err(RouteError::NotAnObject),
        }
    }
}

/// Turn one inbound message into a patch. `Ok(None)` means the topic is not
/// one the bridge tracks.
pub fn route(topic: &str, payload: &[u8], topics: &Topics) -> Result<Option<Patch>, RouteError> {
    let kind = classify(topic, topics);
    if kind == TopicKind::Unknown {
        return Ok(None);
    }

    let payload = Payload::parse(payload)?;
    let patch = match kind {
        TopicKind::Lwt => {
            let online = matches!(&payload, Payload::Text(body) if body == ONLINE_MARKER);
            Patch::presence(online)
        }
        TopicKind::State => Patch::full(state_fields(&Fields(&payload.into_object()?))?),
        TopicKind::Result => Patch::partial(result_fields(&Fields(&payload.into_object()?))?),
        TopicKind::Info1 => {
            let map = unwrap_info(payload.into_object()?, "Info1");
            let f = Fields(&map);
            Patch::partial(DeviceFields {
                module: f.string("Module")?,
                version: f.string("Version")?,
                ..DeviceFields::default()
            })
        }
        TopicKind::Info2 => {
            let map = unwrap_info(payload.into_object()?, "Info2");
            let f = Fields(&map);
            Patch::partial(DeviceFields {
                hostname: f.string("Hostname")?,
                ip: f.string("IPAddress")?,
                ..DeviceFields::default()
            })
        }
        TopicKind::Info3 => {
            let map = unwrap_info(payload.into_object()?, "Info3");
            let f = Fields(&map);
            Patch::partial(DeviceFields {
                restart_reason: f.string("RestartReason")?,
                boot_count: f.u32("BootCount")?,
                ..DeviceFields::default()
            })
        }
        TopicKind::Discovery => {
            let map = payload.into_object()?;
            let f = Fields(&map);
            Patch::partial(DeviceFields {
                ip: f.string("ip")?,
                hostname: f.string("hn")?,
                module: f.string("md")?,
                version: f.string("sw")?,
                ..DeviceFields::default()
            })
        }
        TopicKind::Unknown => return Ok(None),
    };
    Ok(Some(patch))
}

fn state_fields(f: &Fields<'_>) -> Result<DeviceFields, RouteError> {
    Ok(DeviceFields {
        power: f.power("POWER")?,
        online: Some(true),
        ip: f.string("IPAddress")?,
        hostname: f.string("Hostname")?,
        module: f.string("Module")?,
        version: f.string("Version")?,
        restart_reason: f.string("RestartReason")?,
        boot_count: f.u32("BootCount")?,
        dimmer: f.u8("Dimmer")?,
        color: f.string("Color")?,
        hsb_color: f.string("HSBColor")?,
        ct: f.u16("CT")?,
        wifi: f.object("Wifi")?,
    })
}

fn result_fields(f: &Fields<'_>) -> Result<DeviceFields, RouteError> {
    Ok(DeviceFields {
        power: f.power("POWER")?,
        dimmer: f.u8("Dimmer")?,
        ct: f.u16("CT")?,
        hsb_color: f.string("HSBColor")?,
        ..DeviceFields::default()
    })
}

/// Newer firmware nests INFO payloads under their own name.
fn unwrap_info(mut map: Map<String, Value>, key: &str) -> Map<String, Value> {
    match map.remove(key) {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            map.insert(key.to_string(), other);
            map
        }
        None => map,
    }
}

/// Typed, presence-based accessors over a payload object. Absent and null
/// keys read as `None`.
struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn invalid(key: &'static str, value: &Value) -> RouteError {
        RouteError::InvalidField {
            key,
            value: value.to_string(),
        }
    }

    fn string(&self, key: &'static str) -> Result<Option<String>, RouteError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Self::invalid(key, other)),
        }
    }

    fn power(&self, key: &'static str) -> Result<Option<Power>, RouteError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => s.parse().map(Some).map_err(|_| RouteError::InvalidField {
                key,
                value: s.clone(),
            }),
            Some(other) => Err(Self::invalid(key, other)),
        }
    }

    fn unsigned(&self, key: &'static str) -> Result<Option<(u64, &Value)>, RouteError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_u64().map(|n| Some((n, v))).ok_or_else(|| Self::invalid(key, v)),
        }
    }

    fn u8(&self, key: &'static str) -> Result<Option<u8>, RouteError> {
        self.unsigned(key)?
            .map(|(n, v)| u8::try_from(n).map_err(|_| Self::invalid(key, v)))
            .transpose()
    }

    fn u16(&self, key: &'static str) -> Result<Option<u16>, RouteError> {
        self.unsigned(key)?
            .map(|(n, v)| u16::try_from(n).map_err(|_| Self::invalid(key, v)))
            .transpose()
    }

    fn u32(&self, key: &'static str) -> Result<Option<u32>, RouteError> {
        self.unsigned(key)?
            .map(|(n, v)| u32::try_from(n).map_err(|_| Self::invalid(key, v)))
            .transpose()
    }

    fn object(&self, key: &'static str) -> Result<Option<Map<String, Value>>, RouteError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(other) => Err(Self::invalid(key, other)),
        }
    }
}
