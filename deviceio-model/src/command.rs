use serde::{Deserialize, Serialize};

use crate::{DeviceId, Param};

/// Server-assigned command identifier, echoed back in acknowledgments
pub type CommandId = i64;

/// An instruction for a device, as delivered by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub device_id: DeviceId,
    pub command_id: CommandId,
    #[serde(rename = "type")]
    pub kind: String,
    /// Parameters in the order they were received
    pub params: Vec<Param>,
}

impl Command {
    pub fn new(device_id: impl Into<DeviceId>, command_id: CommandId, kind: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            command_id,
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Look up the value of the first param called `name`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.value())
    }
}
