//! Messages exchanged with the device API
//!
//! Everything here is a plain value: commands come in from the server, and
//! measurements, alerts and acknowledgments go out. None of these types know
//! about the wire format, that lives with the remote client.

mod ack;
mod alert;
mod command;
mod measurement;
mod param;
mod result;

pub use ack::Ack;
pub use alert::Alert;
pub use command::{Command, CommandId};
pub use measurement::{Measurement, Timestamp};
pub use param::Param;
pub use result::{ApplicationResult, DeviceResult, ResultCodeError};

pub use deviceio_util::types::DeviceId;
