use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{Span, field, instrument};

use crate::envelope::Envelope;
use crate::util::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use crate::util::http::{Client, ClientError, Method, StatusCode, Uri};
use crate::util::types::DeviceId;

#[derive(Debug, Error)]
pub enum RequestError {
    /// The request never got an answer: connection, timeout or body read
    #[error("request failed: {0}")]
    Transport(#[from] ClientError),

    #[error("server replied with status {0}")]
    Status(StatusCode),
}

/// Metrics tracking the success and failure counts for HTTP requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestMetrics {
    /// Number of successful HTTP requests (2xx status codes).
    pub success_count: u64,
    /// Number of failed HTTP requests (non-2xx status codes, network errors).
    pub error_count: u64,
}

impl RequestMetrics {
    /// Returns the total number of requests made (successful + failed).
    pub fn total_requests(&self) -> u64 {
        self.success_count + self.error_count
    }

    /// Returns the success rate as a percentage (0.0 to 100.0).
    ///
    /// Returns 0.0 if no requests have been made yet.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            (self.success_count as f64 / total as f64) * 100.0
        }
    }
}

/// Request counters that can be updated from concurrent senders
#[derive(Debug, Default)]
struct Counters {
    success: AtomicU64,
    error: AtomicU64,
}

impl Counters {
    fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RequestMetrics {
        RequestMetrics {
            success_count: self.success.load(Ordering::Relaxed),
            error_count: self.error.load(Ordering::Relaxed),
        }
    }
}

/// HTTP POST client for outbound envelopes.
///
/// One instance is shared by every sender so metrics cover all uploads.
/// Requests are never retried, a failed envelope is simply lost.
#[derive(Debug)]
pub struct Post {
    client: Client,
    endpoint: Uri,
    counters: Counters,
}

impl Post {
    /// Create a POST client whose requests may take at most `timeout`
    pub fn new(endpoint: Uri, timeout: Duration) -> Self {
        Self {
            client: Client::new(Some(timeout)),
            endpoint,
            counters: Counters::default(),
        }
    }

    /// Returns the current request metrics for this client.
    pub fn metrics(&self) -> RequestMetrics {
        self.counters.snapshot()
    }

    /// Upload `envelope` and return the response body.
    #[instrument(level = "trace", skip_all, fields(seq = envelope.seq(), response = field::Empty), err(level = "warn"))]
    pub async fn send(&self, envelope: &Envelope) -> Result<String, RequestError> {
        let body = envelope.as_str().to_owned();
        let len = envelope.len();

        let response = self
            .client
            .request(Method::POST, &self.endpoint, |request| {
                Ok(request
                    .header(CONTENT_TYPE, "application/xml")
                    .header(CONTENT_LENGTH, len)
                    .body(body))
            })
            .await
            .inspect_err(|_| self.counters.record_failure())?;

        let status = response.status();
        Span::current().record("response", field::display(status));

        if !status.is_success() {
            self.counters.record_failure();
            return Err(RequestError::Status(status));
        }

        let text = response
            .text()
            .await
            .inspect_err(|_| self.counters.record_failure())?;

        self.counters.record_success();
        Ok(text)
    }
}

/// HTTP GET client for the command long-poll.
///
/// Each request asks the server to hold on to it for up to `timeout`
/// seconds while waiting for commands for `device_id`.
#[derive(Debug)]
pub struct Poll {
    client: Client,
    endpoint: Uri,
    device_id: DeviceId,
    timeout_secs: u64,
    counters: Counters,
}

impl Poll {
    /// Create a poll client.
    ///
    /// Connecting and every read are bounded by the same `timeout_secs` the
    /// server is asked to hold the request for. The request as a whole is
    /// not bounded since the server is expected to hold it open.
    pub fn new(endpoint: Uri, device_id: DeviceId, timeout_secs: u64) -> Result<Self, ClientError> {
        let io_timeout = Duration::from_secs(timeout_secs);
        Ok(Self {
            client: Client::with_io_timeouts(io_timeout, io_timeout)?,
            endpoint,
            device_id,
            timeout_secs,
            counters: Counters::default(),
        })
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Seconds the server is asked to hold each poll
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn metrics(&self) -> RequestMetrics {
        self.counters.snapshot()
    }

    /// Wait for the server to release the next payload.
    ///
    /// The body is returned as is, it may well be empty.
    #[instrument(level = "trace", skip_all, fields(response = field::Empty), err(level = "debug"))]
    pub async fn get(&self) -> Result<String, RequestError> {
        let timeout = self.timeout_secs.to_string();

        let response = self
            .client
            .request(Method::GET, &self.endpoint, |request| {
                Ok(request.query(&[("id", self.device_id.as_str()), ("timeout", timeout.as_str())]))
            })
            .await
            .inspect_err(|_| self.counters.record_failure())?;

        let status = response.status();
        Span::current().record("response", field::display(status));

        if !status.is_success() {
            self.counters.record_failure();
            return Err(RequestError::Status(status));
        }

        let text = response
            .text()
            .await
            .inspect_err(|_| self.counters.record_failure())?;

        self.counters.record_success();
        Ok(text)
    }
}
