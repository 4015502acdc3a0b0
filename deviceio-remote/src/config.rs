use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::http::Uri;
use crate::util::types::ProxyId;

/// Device API endpoint serving both the long-poll and envelope uploads
pub const DEFAULT_API_ENDPOINT: &str = "http://developer.peoplepowerco.com/deviceio/ml";

/// Remote API configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RemoteConfig {
    pub api_endpoint: Uri,
    pub proxy_id: ProxyId,
    #[serde(default)]
    pub request: RequestConfig,
}

impl RemoteConfig {
    /// Configuration for `proxy_id` talking to the default endpoint
    pub fn new(proxy_id: impl Into<ProxyId>) -> Self {
        Self {
            api_endpoint: Uri::from_static(DEFAULT_API_ENDPOINT),
            proxy_id: proxy_id.into(),
            request: RequestConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RequestConfig {
    /// How long the server may hold a poll open. Rounded up to whole
    /// seconds, which also bound connecting to the server and each read
    /// from it while polling.
    #[serde(with = "duration_ms")]
    pub poll_timeout: Duration,

    /// Total time allowed for posting one envelope and reading the reply
    #[serde(with = "duration_ms")]
    pub send_timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl RequestConfig {
    /// The `timeout` query value for poll requests, in whole seconds.
    ///
    /// The server only understands seconds, sub-second timeouts round up.
    pub fn poll_timeout_secs(&self) -> u64 {
        let secs = self.poll_timeout.as_secs();
        if self.poll_timeout.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
