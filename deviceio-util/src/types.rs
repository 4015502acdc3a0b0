use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;

/// Identity of the proxy (gateway) sending envelopes, conventionally the
/// hardware address of the host in upper-case hex, e.g. `0A1B2C3D4E5F`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyId(String);

/// Identifier of a single device behind a proxy
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

macro_rules! string_newtype {
    ($name:ident) => {
        impl Deref for $name {
            type Target = String;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }
    };
}

string_newtype!(ProxyId);
string_newtype!(DeviceId);

impl From<ProxyId> for DeviceId {
    /// A proxy that reports for itself uses its own identity as device id
    fn from(value: ProxyId) -> Self {
        Self(value.0)
    }
}
