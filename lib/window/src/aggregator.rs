//! The windowed aggregator (§4.F): a per-key tumbling-window counter with a
//! parallel lazy stream of closed windows, shared by the repetition (§4.G)
//! and throttle (§4.H) processors.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::BoxStream;
use futures::StreamExt;
use logalike_core::Clock;
use logalike_message::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::window::Window;

type Fingerprint = Box<dyn Fn(&Message) -> String + Send + Sync>;

/// A per-key tumbling window counter (§4.F). `open` holds live windows;
/// `closed` is the parallel lazy sequence of windows the periodic sweep
/// task has evicted.
pub struct Aggregator {
    duration: Duration,
    fingerprint: Fingerprint,
    open: Arc<DashMap<String, Window>>,
    clock: Arc<dyn Clock>,
    closed_tx: mpsc::UnboundedSender<Window>,
    closed_rx: Mutex<Option<mpsc::UnboundedReceiver<Window>>>,
    cancel: CancellationToken,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Aggregator {
    /// Creates an aggregator with tumbling width `duration`, keyed by
    /// `fingerprint`, and starts its background sweep task.
    pub fn new(
        duration: Duration,
        fingerprint: impl Fn(&Message) -> String + Send + Sync + 'static,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let open = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();

        let aggregator = Arc::new(Self {
            duration,
            fingerprint: Box::new(fingerprint),
            open: open.clone(),
            clock: clock.clone(),
            closed_tx: closed_tx.clone(),
            closed_rx: Mutex::new(Some(closed_rx)),
            cancel: cancel.clone(),
            sweep_handle: Mutex::new(None),
        });

        let handle = tokio::spawn(sweep_loop(open, duration, closed_tx, clock, cancel));
        *aggregator
            .sweep_handle
            .lock()
            .expect("aggregator sweep-handle mutex poisoned") = Some(handle);

        aggregator
    }

    /// `increment(m, clock)` (§4.F): bumps (or opens) the window for `m`'s
    /// fingerprint and returns the new count.
    pub fn increment(&self, message: Message) -> u64 {
        let key = (self.fingerprint)(&message);
        let now = self.clock.now();
        let mut entry = self.open.entry(key.clone()).or_insert_with(|| Window {
            fingerprint: key,
            first_message: message.clone(),
            count: 0,
            start_time: now,
        });
        entry.count += 1;
        entry.count
    }

    /// A lazy infinite sequence of closed windows. Callable once; a second
    /// call panics, since the underlying channel has a single consumer.
    pub fn closed_stream(&self) -> BoxStream<'static, Window> {
        let receiver = self
            .closed_rx
            .lock()
            .expect("aggregator closed-rx mutex poisoned")
            .take()
            .expect("Aggregator::closed_stream called more than once");
        UnboundedReceiverStream::new(receiver).boxed()
    }

    /// Triggers the final sweep and stops the background task. Idempotent;
    /// returns immediately (the actual drain happens asynchronously).
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

async fn sweep_loop(
    open: Arc<DashMap<String, Window>>,
    duration: Duration,
    closed_tx: mpsc::UnboundedSender<Window>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                sweep(&open, duration, &closed_tx, clock.as_ref(), false);
            }
            _ = cancel.cancelled() => {
                debug!(message = "aggregator closing, running final sweep");
                sweep(&open, duration, &closed_tx, clock.as_ref(), true);
                break;
            }
        }
    }
}

/// Atomically snapshots `open`, evicts every window whose age is `>=
/// duration` (or every window, if `force`), and pushes each onto `closed`.
fn sweep(
    open: &DashMap<String, Window>,
    duration: Duration,
    closed_tx: &mpsc::UnboundedSender<Window>,
    clock: &dyn Clock,
    force: bool,
) {
    let now = clock.now();
    let stale: Vec<String> = open
        .iter()
        .filter(|entry| {
            force
                || now
                    .checked_duration_since(entry.value().start_time)
                    .map(|age| age >= duration)
                    .unwrap_or(false)
        })
        .map(|entry| entry.key().clone())
        .collect();

    for key in stale {
        if let Some((_, window)) = open.remove(&key) {
            let _ = closed_tx.send(window);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use logalike_core::ManualClock;
    use logalike_message::Value;
    use tokio::time::Duration as TokioDuration;

    fn msg(body: &str) -> Message {
        let mut m = Message::new();
        m.put("body", Value::String(body.to_string()));
        m
    }

    fn fingerprint_on_body(m: &Message) -> String {
        match m.get_raw("body") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn windowed_repetition_counts_match_scenario() {
        let clock = Arc::new(ManualClock::new());
        let aggregator = Aggregator::new(
            Duration::from_millis(100),
            fingerprint_on_body,
            clock.clone(),
        );

        assert_eq!(aggregator.increment(msg("a")), 1);
        assert_eq!(aggregator.increment(msg("a")), 2);
        assert_eq!(aggregator.increment(msg("a")), 3);
        assert_eq!(aggregator.increment(msg("b")), 1);

        let mut closed = aggregator.closed_stream();
        clock.advance(TokioDuration::from_millis(200));
        tokio::time::advance(TokioDuration::from_millis(200)).await;

        let mut seen = std::collections::HashMap::new();
        for _ in 0..2 {
            let window = closed.next().await.expect("window closed");
            seen.insert(window.fingerprint.clone(), window.count);
        }
        assert_eq!(seen.get("a"), Some(&3));
        assert_eq!(seen.get("b"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn close_drains_all_open_windows_regardless_of_age() {
        let clock = Arc::new(ManualClock::new());
        let aggregator = Aggregator::new(Duration::from_secs(60), fingerprint_on_body, clock);
        aggregator.increment(msg("a"));

        let mut closed = aggregator.closed_stream();
        aggregator.close();

        let window = tokio::time::timeout(TokioDuration::from_secs(1), closed.next())
            .await
            .unwrap()
            .expect("final sweep closes the remaining window");
        assert_eq!(window.fingerprint, "a");
    }
}
