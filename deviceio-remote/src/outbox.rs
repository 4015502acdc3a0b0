use std::sync::Arc;

use tracing::{debug, warn};

use crate::envelope::{Envelope, EnvelopeError, Records};
use crate::request::{Post, RequestMetrics};
use crate::sequence::SequenceGenerator;
use crate::util::types::ProxyId;

/// A server reply to an envelope that was delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Sequence number of the delivered envelope
    pub seq: u64,
    /// Response body, may hold commands
    pub body: String,
}

/// Everything needed to put envelopes on the wire on behalf of one proxy.
///
/// Cloning is cheap and clones share the sequence and the POST client.
#[derive(Debug, Clone)]
pub struct Outbox {
    proxy_id: ProxyId,
    sequence: Arc<SequenceGenerator>,
    post: Arc<Post>,
}

impl Outbox {
    pub fn new(proxy_id: ProxyId, sequence: Arc<SequenceGenerator>, post: Arc<Post>) -> Self {
        Self {
            proxy_id,
            sequence,
            post,
        }
    }

    pub fn sequence(&self) -> &Arc<SequenceGenerator> {
        &self.sequence
    }

    pub fn metrics(&self) -> RequestMetrics {
        self.post.metrics()
    }

    /// Wrap `records` in an envelope and post it.
    ///
    /// Returns `Ok(None)` when there was nothing to send or when the upload
    /// failed. Upload failures are logged here and go no further.
    pub async fn deliver(&self, records: Records<'_>) -> Result<Option<Delivery>, EnvelopeError> {
        if records.is_empty() {
            return Ok(None);
        }

        let envelope = Envelope::build(&self.proxy_id, records, &self.sequence)?;
        debug!(
            kind = records.kind(),
            count = records.len(),
            seq = envelope.seq(),
            "sending envelope"
        );

        match self.post.send(&envelope).await {
            Ok(body) => Ok(Some(Delivery {
                seq: envelope.seq(),
                body,
            })),
            Err(e) => {
                warn!(seq = envelope.seq(), "failed to send {}s: {e}", records.kind());
                Ok(None)
            }
        }
    }
}
