use std::fmt::Display;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::{DeviceId, Param};

/// Wall-clock time of a measurement in the `yyyy-MM-ddTHH:mm:ss±HH:mm` form
/// the server expects.
///
/// The value is rendered once and kept as text so the exact string is what
/// gets sent, however late the send happens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Timestamp(String);

impl Timestamp {
    const FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%:z";

    /// Current local time with its UTC offset
    pub fn now() -> Self {
        Self::from(Local::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp
where
    Tz::Offset: Display,
{
    fn from(value: DateTime<Tz>) -> Self {
        Self(value.format(Self::FORMAT).to_string())
    }
}

impl TryFrom<&str> for Timestamp {
    type Error = chrono::ParseError;

    /// Accept any RFC 3339 time, normalizing it to the wire form
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(value)?;
        Ok(parsed.into())
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A set of readings taken from one device at one point in time
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    device_id: DeviceId,
    timestamp: Timestamp,
    params: Vec<Param>,
}

impl Measurement {
    /// Start a measurement for `device_id`, stamped with the current time
    pub fn new(device_id: impl Into<DeviceId>) -> Self {
        Self::at(device_id, Timestamp::now())
    }

    /// Start a measurement for `device_id` taken at `timestamp`
    pub fn at(device_id: impl Into<DeviceId>, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: timestamp.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn add_param(&mut self, param: impl Into<Param>) {
        self.params.push(param.into());
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}
