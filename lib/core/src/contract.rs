use std::sync::Arc;

use futures::stream::BoxStream;
use logalike_message::Message;

/// The message sequence type every stage of the pipeline speaks (§6).
pub type BoxMessageStream = BoxStream<'static, Message>;

/// `get() -> lazy sequence<Message>` plus an optional `close()` (§6).
///
/// Any producer honouring this contract integrates with the runtime: a file
/// input (§4.D), a test fixture, or anything else that can hand back a
/// stream of messages. Both methods take `&self`, matching [`Consumer`], so
/// the runtime (§4.I) can hold a single `Arc<dyn Producer>` for its whole
/// lifetime and call `close()` after the stream has been handed out —
/// implementations that need to consume an owned resource on `get` (e.g.
/// an `mpsc::Receiver`) stash it behind interior mutability and take it
/// once, the same one-shot discipline the windowed aggregator's
/// `closed_stream` already uses.
pub trait Producer: Send + Sync {
    /// Callable once; a second call should panic, mirroring
    /// `Aggregator::closed_stream`.
    fn get(&self) -> BoxMessageStream;

    /// Release resources. Idempotent; called by the runtime during teardown.
    fn close(&self) {}
}

/// `accept(Message)` plus an optional `close()` (§6).
#[async_trait::async_trait]
pub trait Consumer: Send + Sync {
    async fn accept(&self, message: Message);

    /// Idempotent; called by the runtime during teardown.
    async fn close(&self) {}
}

/// `apply(sequence<Message>) -> sequence<Message>` (§6).
///
/// Composition is left-to-right associative with [`IdentityProcessor`] as the
/// neutral element: `chain(p, identity) == chain(identity, p) == p`,
/// observable by message sequence (§8).
pub trait Processor: Send + Sync {
    fn apply(&self, input: BoxMessageStream) -> BoxMessageStream;

    /// Stateful processors with background work (§4.F) override this to stop
    /// their sweep task; the runtime invokes it during teardown.
    fn close(&self) {}
}

/// The neutral element of processor composition.
pub struct IdentityProcessor;

impl Processor for IdentityProcessor {
    fn apply(&self, input: BoxMessageStream) -> BoxMessageStream {
        input
    }
}

/// A left-to-right composed chain of processors.
#[derive(Clone, Default)]
pub struct Chain {
    processors: Vec<Arc<dyn Processor>>,
}

impl Chain {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    pub fn then(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }
}

impl Processor for Chain {
    fn apply(&self, input: BoxMessageStream) -> BoxMessageStream {
        self.processors
            .iter()
            .fold(input, |stream, processor| processor.apply(stream))
    }

    fn close(&self) {
        for processor in &self.processors {
            processor.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::stream::{self, StreamExt};
    use logalike_message::Value;

    fn msg(n: i64) -> Message {
        let mut m = Message::new();
        m.put("n", Value::Integer(n));
        m
    }

    #[tokio::test]
    async fn identity_processor_is_a_neutral_element() {
        let input: Vec<Message> = (0..3).map(msg).collect();
        let stream: BoxMessageStream = stream::iter(input.clone()).boxed();
        let out: Vec<Message> = IdentityProcessor.apply(stream).collect().await;
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn chain_composes_left_to_right() {
        struct Increment;
        impl Processor for Increment {
            fn apply(&self, input: BoxMessageStream) -> BoxMessageStream {
                input
                    .map(|m| {
                        let n = m.get("n", logalike_message::ValueKind::Integer).unwrap().as_i64().unwrap();
                        let mut out = Message::new();
                        out.put("n", Value::Integer(n + 1));
                        out
                    })
                    .boxed()
            }
        }

        let chain = Chain::new().then(Arc::new(Increment)).then(Arc::new(Increment));
        let stream: BoxMessageStream = stream::iter(vec![msg(0)]).boxed();
        let out: Vec<Message> = chain.apply(stream).collect().await;
        assert_eq!(out, vec![msg(2)]);
    }
}
