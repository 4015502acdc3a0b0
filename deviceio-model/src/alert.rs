use serde::{Deserialize, Serialize};

use crate::{DeviceId, Param};

/// A notable event raised by a device, e.g. `MOTION_DETECTED`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    device_id: DeviceId,
    kind: String,
    params: Vec<Param>,
}

impl Alert {
    pub fn new(device_id: impl Into<DeviceId>, kind: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}
