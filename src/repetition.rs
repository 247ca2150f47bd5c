//! The repetition processor (§4.G): tags every message as it passes
//! through, and emits one aggregate per closed window.

use std::sync::Arc;

use async_stream::stream;
use futures::stream::{self, StreamExt};
use logalike_core::{BoxMessageStream, Clock, Processor};
use logalike_message::{Message, Value};
use logalike_window::{Aggregator, Window};

/// Per-message fingerprint function used to key the windowed counter.
pub type Fingerprint = Arc<dyn Fn(&Message) -> String + Send + Sync>;

#[derive(Clone)]
pub struct RepetitionConfig {
    pub window_duration: std::time::Duration,
    pub fingerprint: Fingerprint,
}

/// Annotates the pass-through stream with `{isRepeated: false, repeatCount:
/// 0}` while feeding the windowed counter; in parallel emits one tagged
/// aggregate per closed window.
pub struct RepetitionProcessor {
    aggregator: Arc<Aggregator>,
}

impl RepetitionProcessor {
    pub fn new(config: RepetitionConfig, clock: Arc<dyn Clock>) -> Self {
        let fingerprint = config.fingerprint;
        let aggregator = Aggregator::new(
            config.window_duration,
            move |m: &Message| fingerprint(m),
            clock,
        );
        Self { aggregator }
    }
}

impl Processor for RepetitionProcessor {
    fn apply(&self, input: BoxMessageStream) -> BoxMessageStream {
        let pass_through_aggregator = self.aggregator.clone();
        let pass_through: BoxMessageStream = Box::pin(stream! {
            for await message in input {
                pass_through_aggregator.increment(message.clone());
                yield annotate_pass_through(message);
            }
        });

        let closed: BoxMessageStream = self
            .aggregator
            .closed_stream()
            .map(annotate_closed_window)
            .boxed();

        stream::select(pass_through, closed).boxed()
    }

    fn close(&self) {
        self.aggregator.close();
    }
}

fn annotate_pass_through(mut message: Message) -> Message {
    message.put("isRepeated", Value::Boolean(false));
    message.put("repeatCount", Value::Integer(0));
    message
}

fn annotate_closed_window(window: Window) -> Message {
    let mut message = window.first_message.clone();
    let repeated = window.count > 1;
    message.put("isRepeated", Value::Boolean(repeated));
    message.put("repeatCount", Value::Integer(window.count as i64));
    message
}

#[cfg(test)]
mod test {
    use super::*;
    use logalike_core::ManualClock;
    use std::time::Duration;
    use tokio::time::Duration as TokioDuration;

    fn msg(body: &str) -> Message {
        let mut m = Message::new();
        m.put("body", Value::String(body.to_string()));
        m
    }

    fn fingerprint_on_body(m: &Message) -> String {
        m.get_raw("body")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn closed_windows_tag_repeats_per_scenario() {
        let clock = Arc::new(ManualClock::new());
        let processor = RepetitionProcessor::new(
            RepetitionConfig {
                window_duration: Duration::from_millis(100),
                fingerprint: Arc::new(fingerprint_on_body),
            },
            clock.clone(),
        );

        let input: BoxMessageStream =
            stream::iter(vec![msg("a"), msg("a"), msg("a"), msg("b")]).boxed();
        let mut output = processor.apply(input);

        // Drain the pass-through annotations (order vs. the a/b inputs is
        // preserved since stream::select polls left-biased while the closed
        // side is still empty).
        for _ in 0..4 {
            let message = output.next().await.unwrap();
            assert_eq!(message.get_raw("isRepeated"), Some(&Value::Boolean(false)));
        }

        clock.advance(TokioDuration::from_millis(200));
        tokio::time::advance(TokioDuration::from_millis(200)).await;

        let mut tagged = std::collections::HashMap::new();
        for _ in 0..2 {
            let message = output.next().await.unwrap();
            let body = message.get_raw("body").unwrap().as_str().unwrap().to_string();
            tagged.insert(body, message);
        }

        let a = &tagged["a"];
        assert_eq!(a.get_raw("isRepeated"), Some(&Value::Boolean(true)));
        assert_eq!(a.get_raw("repeatCount"), Some(&Value::Integer(3)));

        let b = &tagged["b"];
        assert_eq!(b.get_raw("isRepeated"), Some(&Value::Boolean(false)));
        assert_eq!(b.get_raw("repeatCount"), Some(&Value::Integer(1)));

        processor.close();
    }
}
