use serde::{Deserialize, Serialize};

use crate::{Command, CommandId, DeviceResult};

/// The device's answer to a single command
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub command_id: CommandId,
    pub result: DeviceResult,
}

impl Ack {
    pub fn new(command_id: CommandId, result: DeviceResult) -> Self {
        Self { command_id, result }
    }

    /// Acknowledge receipt of `command`, before acting on it
    pub fn received(command: &Command) -> Self {
        Self::new(command.command_id, DeviceResult::Received)
    }
}
