use tracing::{debug, instrument};

use crate::ack::AckSender;
use crate::envelope::{EnvelopeError, Records};
use crate::model::{Alert, Command, Measurement};
use crate::outbox::Outbox;
use crate::parser;
use crate::request::RequestMetrics;

/// Uploads measurements and alerts.
///
/// The server may piggyback pending commands on the reply to an upload.
/// Those are acknowledged as received straight away and handed back to the
/// caller, they are not dispatched to any listener.
#[derive(Debug, Clone)]
pub struct MeasurementSender {
    outbox: Outbox,
    acks: AckSender,
}

impl MeasurementSender {
    pub fn new(outbox: Outbox, acks: AckSender) -> Self {
        Self { outbox, acks }
    }

    pub fn metrics(&self) -> RequestMetrics {
        self.outbox.metrics()
    }

    /// Send `measurements` in a single envelope.
    ///
    /// Returns the commands found in the server reply, already acknowledged.
    /// Nothing is sent for an empty slice.
    #[instrument(skip_all, fields(count = measurements.len()))]
    pub async fn send_measurements(
        &self,
        measurements: &[Measurement],
    ) -> Result<Vec<Command>, EnvelopeError> {
        self.send(Records::Measurements(measurements)).await
    }

    pub async fn send_measurement(
        &self,
        measurement: Measurement,
    ) -> Result<Vec<Command>, EnvelopeError> {
        self.send_measurements(&[measurement]).await
    }

    /// Send `alerts` in a single envelope. Replies are handled as for
    /// measurements.
    #[instrument(skip_all, fields(count = alerts.len()))]
    pub async fn send_alerts(&self, alerts: &[Alert]) -> Result<Vec<Command>, EnvelopeError> {
        self.send(Records::Alerts(alerts)).await
    }

    async fn send(&self, records: Records<'_>) -> Result<Vec<Command>, EnvelopeError> {
        let Some(delivery) = self.outbox.deliver(records).await? else {
            return Ok(Vec::new());
        };

        let commands = parser::parse(&delivery.body);
        if !commands.is_empty() {
            debug!(
                seq = delivery.seq,
                count = commands.len(),
                "reply carried commands"
            );
            self.acks.ack_multiple_commands(&commands).await?;
        }

        Ok(commands)
    }
}
