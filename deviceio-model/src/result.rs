use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} result code {code}")]
pub struct ResultCodeError {
    kind: &'static str,
    code: i32,
}

macro_rules! result_codes {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[serde(into = "i32", try_from = "i32")]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code,)+
        }

        impl $name {
            /// The numeric code used on the wire
            pub fn code(self) -> i32 {
                self as i32
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.code()
            }
        }

        impl TryFrom<i32> for $name {
            type Error = ResultCodeError;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(ResultCodeError { kind: $kind, code }),
                }
            }
        }
    };
}

result_codes! {
    /// Result codes a device reports back for a command
    DeviceResult ("device") {
        /// The command arrived, nothing has been done with it yet
        Received = 0,
        Success = 1,
        DeviceNotIdentified = 4,
        CommandNotSupported = 5,
        DeviceConnectionError = 6,
        DeviceExecutionError = 7,
        WrongCommandFormat = 8,
    }
}

result_codes! {
    /// Result codes the server returns to applications using the
    /// application API (login, location, activation)
    ApplicationResult ("application") {
        Success = 0,
        InternalError = 1,
        WrongApiKey = 2,
        WrongLocationId = 3,
        WrongDeviceId = 4,
        ProxyNotFound = 5,
        ObjectNotFound = 6,
        AccessDenied = 7,
        WrongParameterValue = 8,
        MissingMandatoryParameterValue = 9,
        NoDeviceResources = 10,
        UnknownUsername = 11,
        WrongPassword = 12,
        WrongIndexValue = 13,
        ErrorParsingInputData = 14,
        WrongConsumerId = 15,
        WrongConsumerTypeId = 16,
        WrongActivationKey = 17,
        WrongRuleScheduleFormat = 18,
        WrongRuleId = 19,
        DuplicateUsername = 20,
        DeviceOffline = 21,
        DeviceNotAtLocation = 22,
        WrongDeviceRegistrationCode = 24,
        TooManyDeviceTypesForUser = 25,
    }
}
