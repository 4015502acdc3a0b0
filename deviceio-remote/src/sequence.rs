use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter stamped on every outbound envelope.
///
/// The server uses the sequence to order and de-duplicate envelopes from one
/// proxy, so acknowledgments and measurements must draw from the same
/// generator. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    last: AtomicU64,
}

impl SequenceGenerator {
    /// A generator whose first value is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next sequence number.
    ///
    /// Values are strictly increasing with no gaps, whatever the number of
    /// concurrent callers.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The last value handed out, 0 if none yet
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
