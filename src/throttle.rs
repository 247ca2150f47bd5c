//! The throttle processor (§4.H): drops over-limit emitters within a
//! window and notifies on start/recurring/end transitions.

use std::sync::Arc;

use async_stream::stream;
use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use logalike_core::{BoxMessageStream, Clock, Processor};
use logalike_message::Message;
use logalike_window::{Aggregator, Window};
use tokio::time::Instant;

/// Per-message fingerprint function used to key both the windowed counter
/// and the throttle record.
pub type Fingerprint = Arc<dyn Fn(&Message) -> String + Send + Sync>;

#[derive(Clone)]
pub struct ThrottleConfig {
    pub window_duration: std::time::Duration,
    pub limit: u64,
    pub fingerprint: Fingerprint,
}

/// The four transitions a closed window can drive for a given emitter
/// (§4.H): `Normal` carries no notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Starting,
    Recurring,
    Ending,
    Normal,
}

/// `{onStart, onRecurring, onEnd}` (§4.H): each may produce a notification
/// message; `None` means "no notification for this transition".
pub trait ThrottleListener: Send + Sync {
    fn on_start(&self, _fingerprint: &str) -> Option<Message> {
        None
    }
    fn on_recurring(&self, _fingerprint: &str) -> Option<Message> {
        None
    }
    fn on_end(&self, _fingerprint: &str) -> Option<Message> {
        None
    }
}

/// A [`ThrottleListener`] that never emits a notification message, useful
/// when only the pass-through drop behaviour is wanted.
pub struct SilentListener;

impl ThrottleListener for SilentListener {}

/// Drops messages from emitters currently over `limit` within a tumbling
/// window of `window_duration`, and raises start/recurring/end
/// notifications as each emitter's most recent closed window crosses the
/// limit (§4.H).
pub struct ThrottleProcessor<L: ThrottleListener> {
    aggregator: Arc<Aggregator>,
    fingerprint: Fingerprint,
    /// fingerprint -> time it was recorded over-limit (§3's throttle record).
    record: Arc<DashMap<String, Instant>>,
    limit: u64,
    listener: Arc<L>,
    clock: Arc<dyn Clock>,
}

impl<L: ThrottleListener + 'static> ThrottleProcessor<L> {
    pub fn new(config: ThrottleConfig, listener: L, clock: Arc<dyn Clock>) -> Self {
        let fingerprint = config.fingerprint.clone();
        let aggregator = Aggregator::new(
            config.window_duration,
            move |m: &Message| fingerprint(m),
            clock.clone(),
        );
        Self {
            aggregator,
            fingerprint: config.fingerprint,
            record: Arc::new(DashMap::new()),
            limit: config.limit,
            listener: Arc::new(listener),
            clock,
        }
    }
}

impl<L: ThrottleListener + 'static> Processor for ThrottleProcessor<L> {
    fn apply(&self, input: BoxMessageStream) -> BoxMessageStream {
        let aggregator = self.aggregator.clone();
        let fingerprint = self.fingerprint.clone();
        let record_for_pass_through = self.record.clone();
        let limit = self.limit;

        // Pass-through (§4.H): the counter is bumped unconditionally so
        // over-limit emitters are still measured while being dropped.
        let pass_through: BoxMessageStream = Box::pin(stream! {
            for await message in input {
                let key = fingerprint(&message);
                let count = aggregator.increment(message.clone());
                let throttled = record_for_pass_through.contains_key(&key);
                if !throttled && count <= limit {
                    yield message;
                }
            }
        });

        let record_for_closed = self.record.clone();
        let limit = self.limit;
        let listener = self.listener.clone();
        let clock = self.clock.clone();
        let notifications: BoxMessageStream = self
            .aggregator
            .closed_stream()
            .filter_map(move |window| {
                let record = record_for_closed.clone();
                let listener = listener.clone();
                let now = clock.now();
                async move { handle_closed_window(&record, limit, listener.as_ref(), window, now) }
            })
            .boxed();

        stream::select(pass_through, notifications).boxed()
    }

    fn close(&self) {
        self.aggregator.close();
    }
}

/// Computes and applies the transition for one closed window (§4.H),
/// serialised per key by `DashMap`'s shard lock covering the record
/// read-modify-write plus the listener call.
fn handle_closed_window<L: ThrottleListener + ?Sized>(
    record: &DashMap<String, Instant>,
    limit: u64,
    listener: &L,
    window: Window,
    now: Instant,
) -> Option<Message> {
    let key = window.fingerprint;
    let over_limit = window.count > limit;

    let (transition, notification) = match record.entry(key.clone()) {
        DashEntry::Occupied(_) if over_limit => (Transition::Recurring, listener.on_recurring(&key)),
        DashEntry::Occupied(entry) => {
            entry.remove();
            (Transition::Ending, listener.on_end(&key))
        }
        DashEntry::Vacant(entry) if over_limit => {
            entry.insert(now);
            (Transition::Starting, listener.on_start(&key))
        }
        DashEntry::Vacant(_) => (Transition::Normal, None),
    };

    tracing::trace!(message = "throttle transition", fingerprint = %key, ?transition, count = window.count, limit);
    notification
}
