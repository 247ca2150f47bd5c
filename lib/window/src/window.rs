use logalike_message::Message;
use tokio::time::Instant;

/// A per-key tumbling window (§3): the message that opened it, a running
/// count, and the instant (from an injected [`logalike_core::Clock`]) it
/// opened at.
#[derive(Debug, Clone)]
pub struct Window {
    pub fingerprint: String,
    pub first_message: Message,
    pub count: u64,
    pub start_time: Instant,
}
