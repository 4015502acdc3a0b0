use tracing::{instrument, trace};

use crate::envelope::{EnvelopeError, Records};
use crate::model::{Ack, Command, DeviceResult};
use crate::outbox::Outbox;
use crate::request::RequestMetrics;

/// Reports command results back to the server.
#[derive(Debug, Clone)]
pub struct AckSender {
    outbox: Outbox,
}

impl AckSender {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }

    /// Metrics for every upload sharing this sender's client
    pub fn metrics(&self) -> RequestMetrics {
        self.outbox.metrics()
    }

    /// Acknowledge receipt of `commands` in a single envelope.
    ///
    /// Returns the sequence of the envelope, or `None` if nothing was sent
    /// because `commands` was empty or the upload failed. Any body the
    /// server sends back is ignored.
    #[instrument(skip_all, fields(count = commands.len()))]
    pub async fn ack_multiple_commands(
        &self,
        commands: &[Command],
    ) -> Result<Option<u64>, EnvelopeError> {
        let acks: Vec<Ack> = commands.iter().map(Ack::received).collect();
        self.send_acks(&acks).await
    }

    /// Acknowledge receipt of a single command
    pub async fn ack_command(&self, command: &Command) -> Result<Option<u64>, EnvelopeError> {
        self.send_acks(&[Ack::received(command)]).await
    }

    /// Report the outcome of a command
    pub async fn send_result(
        &self,
        command: &Command,
        result: DeviceResult,
    ) -> Result<Option<u64>, EnvelopeError> {
        self.send_ack(Ack::new(command.command_id, result)).await
    }

    pub async fn send_ack(&self, ack: Ack) -> Result<Option<u64>, EnvelopeError> {
        self.send_acks(&[ack]).await
    }

    /// Send arbitrary acknowledgments in a single envelope, in order
    pub async fn send_acks(&self, acks: &[Ack]) -> Result<Option<u64>, EnvelopeError> {
        let delivery = self.outbox.deliver(Records::Acks(acks)).await?;
        Ok(delivery.map(|d| {
            trace!(seq = d.seq, "acks delivered");
            d.seq
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use mockito::Server;

    use crate::request::Post;
    use crate::sequence::SequenceGenerator;
    use crate::util::http::Uri;
    use crate::util::types::ProxyId;

    const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

    fn sender(endpoint: &str, proxy_id: &str) -> (AckSender, Arc<SequenceGenerator>) {
        let endpoint: Uri = endpoint.parse().unwrap();
        let sequence = Arc::new(SequenceGenerator::new());
        let post = Arc::new(Post::new(endpoint, Duration::from_secs(5)));
        let outbox = Outbox::new(ProxyId::from(proxy_id), Arc::clone(&sequence), post);
        (AckSender::new(outbox), sequence)
    }

    #[tokio::test]
    async fn test_acks_all_commands_in_one_envelope() {
        let mut server = Server::new_async().await;
        let expected = format!(
            "{HEADER}{}\n",
            r#"<h2s ver="2" proxyId="PROXY" seq="1"><response cmdId="5" result="0"/><response cmdId="6" result="0"/></h2s>"#
        );
        let mock = server
            .mock("POST", "/deviceio/ml")
            .match_header("content-type", "application/xml")
            .match_header("content-length", expected.len().to_string().as_str())
            .match_body(expected.as_str())
            .with_status(200)
            .create_async()
            .await;

        let (acks, _) = sender(&format!("{}/deviceio/ml", server.url()), "PROXY");
        let commands = [
            Command::new("a", 5, "set"),
            Command::new("b", 6, "set"),
        ];

        let seq = acks.ack_multiple_commands(&commands).await.unwrap();
        assert_eq!(seq, Some(1));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_acks_make_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .expect(0)
            .create_async()
            .await;

        let (acks, sequence) = sender(&server.url(), "PROXY");

        assert_eq!(acks.ack_multiple_commands(&[]).await.unwrap(), None);
        assert_eq!(acks.send_acks(&[]).await.unwrap(), None);
        assert_eq!(sequence.last(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reports_command_results() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::Regex(
                r#"<response cmdId="42" result="7"/>"#.into(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let (acks, _) = sender(&server.url(), "PROXY");
        let command = Command::new("a", 42, "set");

        let seq = acks
            .send_result(&command, DeviceResult::DeviceExecutionError)
            .await
            .unwrap();
        assert_eq!(seq, Some(1));
        assert_eq!(acks.metrics().success_count, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_failures_are_not_errors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let (acks, sequence) = sender(&server.url(), "PROXY");
        let command = Command::new("a", 1, "set");

        assert_eq!(acks.ack_command(&command).await.unwrap(), None);
        // the envelope was built, so its sequence is spent
        assert_eq!(sequence.last(), 1);
        mock.assert_async().await;

        let (unreachable, _) = sender("http://127.0.0.1:9/", "PROXY");
        assert_eq!(unreachable.ack_command(&command).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_an_empty_proxy_id() {
        let (acks, sequence) = sender("http://127.0.0.1:9/", "");
        let command = Command::new("a", 1, "set");

        assert_eq!(
            acks.ack_command(&command).await,
            Err(EnvelopeError::EmptyProxyId)
        );
        assert_eq!(sequence.last(), 0);
    }
}
