//! The pipeline runtime (§4.I): composes `producer -> chain -> consumer`
//! and owns the single cancellation flag that drives cooperative shutdown.

use std::sync::Arc;

use futures::StreamExt;
use logalike_core::{BoxMessageStream, Chain, Consumer, Processor, Producer};
use tokio_util::sync::CancellationToken;

/// Drives messages from a [`Producer`] through a composed [`Chain`] to a
/// [`Consumer`], short-circuiting at the next message boundary once
/// `close()` has been called (§4.I, §5).
///
/// `close()` is idempotent: cancelling an already-cancelled token is a
/// no-op, and both `Processor::close`/`Producer::close`/`Consumer::close`
/// are themselves idempotent by contract (§6).
pub struct PipelineRuntime {
    chain: Chain,
    cancel: CancellationToken,
}

impl PipelineRuntime {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            cancel: CancellationToken::new(),
        }
    }

    /// Runs until the producer's stream ends or `close()` is observed.
    ///
    /// Per spec.md §9's pinned shutdown contract: at the moment `close()`'s
    /// cancellation is observed, at most one message per call to `run` may
    /// be in flight in `consumer.accept`; nothing is guaranteed delivered
    /// after `run` returns.
    pub async fn run(&self, producer: Arc<dyn Producer>, consumer: Arc<dyn Consumer>) {
        let stream: BoxMessageStream = self.chain.apply(producer.get());
        tokio::pin!(stream);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = stream.next() => {
                    match next {
                        Some(message) => consumer.accept(message).await,
                        None => break,
                    }
                }
            }
        }
    }

    /// Sets the close flag, then closes the processor chain, consumer, and
    /// producer in turn — the consumer (J) drains and shuts down first,
    /// then the chain is unwound back through the producer (§2: "shuts down
    /// J after draining, then D→C→B→A in reverse dependency order"). Safe to
    /// call concurrently with `run`; the in-flight `run` loop observes the
    /// flag at its next message boundary.
    pub async fn close(&self, producer: &dyn Producer, consumer: &dyn Consumer) {
        self.cancel.cancel();
        self.chain.close();
        consumer.close().await;
        producer.close();
    }

    /// `true` once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
