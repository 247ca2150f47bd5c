//! The bulk egress batcher (§4.J): a [`Consumer`] that coalesces accepted
//! messages into size- and time-bounded batches with bounded in-flight
//! concurrency.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use logalike_core::Consumer;
use logalike_message::Message;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::BatcherConfig;
use crate::document::normalize_document;
use crate::error::Error;
use crate::transport::{render_ndjson, Action, BulkTransport};

pub struct BulkEgress {
    config: BatcherConfig,
    transport: Arc<dyn BulkTransport>,
    pending: Mutex<Vec<Action>>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    flush_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl BulkEgress {
    pub fn new(config: BatcherConfig, transport: Arc<dyn BulkTransport>) -> Result<Arc<Self>, Error> {
        config.validate()?;
        let max_concurrency = config.max_concurrency;

        let egress = Arc::new(Self {
            config,
            transport,
            pending: Mutex::new(Vec::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            cancel: CancellationToken::new(),
            flush_handle: StdMutex::new(None),
        });

        let periodic = egress.clone();
        let handle = tokio::spawn(async move { periodic.flush_loop().await });
        *egress
            .flush_handle
            .lock()
            .expect("egress flush-handle mutex poisoned") = Some(handle);

        Ok(egress)
    }

    async fn flush_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.flush_interval);
        interval.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                _ = interval.tick() => self.flush().await,
                _ = self.cancel.cancelled() => {
                    self.flush().await;
                    break;
                }
            }
        }
    }

    /// Drains `pending` and dispatches it, blocking only until a
    /// concurrency permit is available (§4.J, §5).
    async fn flush(&self) {
        let batch = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
        };

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("egress semaphore never closed");
        let transport = self.transport.clone();
        let body = render_ndjson(&batch);

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(error) = transport.send_bulk(body).await {
                error!(message = "bulk egress batch failed", batch_size = batch.len(), %error);
                for (id, action) in batch.iter().enumerate() {
                    error!(
                        message = "rejected action",
                        id,
                        destination = %action.destination_wire_name,
                        %error,
                    );
                }
            }
        });
    }
}

#[async_trait::async_trait]
impl Consumer for BulkEgress {
    async fn accept(&self, message: Message) {
        let now = Utc::now();
        let document = normalize_document(&message, now);

        let destinations = if message.destinations().is_empty() {
            vec![self.config.default_destination.clone()]
        } else {
            message.destinations().to_vec()
        };

        let should_flush = {
            let mut pending = self.pending.lock().await;
            for destination in destinations {
                pending.push(Action {
                    destination_wire_name: destination.wire_name(now),
                    doc_type: self.config.doc_type.clone(),
                    document: document.clone(),
                });
            }
            pending.len() >= self.config.max_actions
        };

        if should_flush {
            self.flush().await;
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
        let handle = self
            .flush_handle
            .lock()
            .expect("egress flush-handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
