//! Command Gateway: authenticates callers, validates control input and hands
//! accepted commands to the bridge event loop.

use secrecy::{ExposeSecret, SecretString};
use tasbridge_core::{
    BridgeHandle, ColorTemperature, ControlCommand, DeviceState, Dimmer, Hsb,
};
use tracing::{debug, warn};

use crate::error::ApiError;

pub struct CommandGateway {
    api_key: SecretString,
    bridge: BridgeHandle,
}

impl CommandGateway {
    pub fn new(api_key: SecretString, bridge: BridgeHandle) -> Self {
        Self { api_key, bridge }
    }

    /// Key check without side effects beyond the log line.
    pub fn login(&self, presented: Option<&str>) -> Result<(), ApiError> {
        if self.key_matches(presented) {
            Ok(())
        } else {
            debug!("Login rejected");
            Err(ApiError::Unauthorized)
        }
    }

    /// Gate for every protected operation. Failures are logged with the
    /// caller's address.
    pub fn authenticate(&self, presented: Option<&str>, origin: &str) -> Result<(), ApiError> {
        if self.key_matches(presented) {
            return Ok(());
        }
        warn!(origin, "Failed authentication attempt");
        Err(ApiError::Unauthorized)
    }

    pub async fn status(&self) -> Result<DeviceState, ApiError> {
        Ok(self.bridge.snapshot().await?)
    }

    /// Flip power relative to the live record. Any body content is ignored.
    pub async fn set_power(&self) -> Result<DeviceState, ApiError> {
        self.execute(ControlCommand::TogglePower).await
    }

    pub async fn set_color_temperature(&self, value: i64) -> Result<DeviceState, ApiError> {
        let ct = ColorTemperature::new(value).map_err(ApiError::validation("Invalid CT value"))?;
        self.execute(ControlCommand::SetColorTemperature(ct)).await
    }

    pub async fn set_dimmer(&self, value: i64) -> Result<DeviceState, ApiError> {
        let dimmer = Dimmer::new(value).map_err(ApiError::validation("Invalid dimmer value"))?;
        self.execute(ControlCommand::SetDimmer(dimmer)).await
    }

    pub async fn set_hsb(
        &self,
        hue: i64,
        saturation: i64,
        brightness: i64,
    ) -> Result<DeviceState, ApiError> {
        let hsb = Hsb::new(hue, saturation, brightness)
            .map_err(ApiError::validation("Invalid HSB values"))?;
        self.execute(ControlCommand::SetHsb(hsb)).await
    }

    async fn execute(&self, command: ControlCommand) -> Result<DeviceState, ApiError> {
        Ok(self.bridge.execute(command).await?)
    }

    fn key_matches(&self, presented: Option<&str>) -> bool {
        presented.is_some_and(|key| key == self.api_key.expose_secret())
    }
}
