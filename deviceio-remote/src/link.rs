use std::sync::Arc;

use crate::ack::AckSender;
use crate::config::RemoteConfig;
use crate::measure::MeasurementSender;
use crate::outbox::Outbox;
use crate::poll::LongPollChannel;
use crate::request::{Post, RequestMetrics};
use crate::sequence::SequenceGenerator;
use crate::util::http::ClientError;
use crate::util::types::DeviceId;

/// Connection to the device API on behalf of one proxy.
///
/// Every sender and channel obtained from a link shares its sequence
/// generator and upload client.
#[derive(Debug, Clone)]
pub struct DeviceLink {
    config: RemoteConfig,
    outbox: Outbox,
    acks: AckSender,
    measurements: MeasurementSender,
}

impl DeviceLink {
    pub fn new(config: RemoteConfig) -> Self {
        let post = Post::new(config.api_endpoint.clone(), config.request.send_timeout);
        let outbox = Outbox::new(
            config.proxy_id.clone(),
            Arc::new(SequenceGenerator::new()),
            Arc::new(post),
        );
        let acks = AckSender::new(outbox.clone());
        let measurements = MeasurementSender::new(outbox.clone(), acks.clone());

        Self {
            config,
            outbox,
            acks,
            measurements,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn sequence(&self) -> &Arc<SequenceGenerator> {
        self.outbox.sequence()
    }

    pub fn acks(&self) -> &AckSender {
        &self.acks
    }

    pub fn measurements(&self) -> &MeasurementSender {
        &self.measurements
    }

    /// Metrics for all uploads made through this link
    pub fn metrics(&self) -> RequestMetrics {
        self.outbox.metrics()
    }

    /// Create an idle command channel for `device_id`, acknowledging
    /// through this link
    pub fn channel(&self, device_id: impl Into<DeviceId>) -> Result<LongPollChannel, ClientError> {
        LongPollChannel::new(&self.config, device_id, self.acks.clone())
    }
}
