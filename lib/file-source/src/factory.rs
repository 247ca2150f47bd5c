//! The tailer factory (§4.C): one bounded line queue shared by every tailer
//! it spawns, with a bounded, lossy enqueue timeout as the pipeline's only
//! backpressure signal to file readers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use logalike_position_store::PositionStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Error;
use crate::watcher::{StartFrom, Tailer, TailerConfig, TailerListener};

/// A decoded line, tagged with the file it came from.
#[derive(Debug, Clone)]
pub struct Line {
    pub path: PathBuf,
    pub text: String,
}

/// Resolved or deferred starting point for a newly-spawned tailer (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    Beginning,
    End,
    Explicit(u64),
    /// Resolved from the position store at spawn time; `Beginning` if no
    /// entry exists.
    Auto,
}

#[derive(Debug, Clone)]
pub struct FactoryConfig {
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub start_policy: StartPolicy,
    pub poll_interval: Duration,
    pub buffer_size: usize,
    pub reopen_each_poll: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 500,
            enqueue_timeout: Duration::from_secs(60),
            start_policy: StartPolicy::End,
            poll_interval: Duration::from_millis(500),
            buffer_size: 4096,
            reopen_each_poll: false,
        }
    }
}

struct QueueingListener {
    sender: mpsc::Sender<Line>,
    enqueue_timeout: Duration,
    position_store: Option<Arc<PositionStore>>,
}

#[async_trait::async_trait]
impl TailerListener for QueueingListener {
    async fn on_line(&self, path: &Path, line: String) {
        let item = Line {
            path: path.to_path_buf(),
            text: line,
        };
        match tokio::time::timeout(self.enqueue_timeout, self.sender.send(item)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // Receiver (FileInput) has been dropped; nothing left to do.
            }
            Err(_) => {
                warn!(
                    message = "dropping line after enqueue timeout",
                    path = %path.display(),
                    timeout_secs = self.enqueue_timeout.as_secs(),
                );
            }
        }
    }

    async fn on_rotated(&self, path: &Path) {
        tracing::debug!(message = "tailer observed rotation", path = %path.display());
    }

    async fn on_position_advanced(&self, path: &Path, pos: u64) {
        if let Some(store) = &self.position_store {
            if let Err(error) = store.set(path, pos as i64) {
                warn!(message = "failed to persist tailer position", path = %path.display(), %error);
            }
        }
    }
}

/// Launches one [`Tailer`] per file, all feeding a single bounded queue.
pub struct TailerFactory {
    config: FactoryConfig,
    position_store: Option<Arc<PositionStore>>,
    sender: mpsc::Sender<Line>,
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TailerFactory {
    pub fn new(
        config: FactoryConfig,
        position_store: Option<Arc<PositionStore>>,
    ) -> (Self, mpsc::Receiver<Line>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        (
            Self {
                config,
                position_store,
                sender,
                cancel: CancellationToken::new(),
                handles: std::sync::Mutex::new(Vec::new()),
            },
            receiver,
        )
    }

    /// Spawns a tailer for `path`, resolving `StartPolicy::Auto` against the
    /// position store if one is configured.
    pub fn spawn(&self, path: PathBuf) -> Result<(), Error> {
        let start_from = self.resolve_start(&path);

        let tailer_config = TailerConfig {
            poll_interval: self.config.poll_interval,
            start_from,
            buffer_size: self.config.buffer_size,
            reopen_each_poll: self.config.reopen_each_poll,
        };
        tailer_config.validate()?;

        let listener = QueueingListener {
            sender: self.sender.clone(),
            enqueue_timeout: self.config.enqueue_timeout,
            position_store: self.position_store.clone(),
        };
        let tailer = Tailer::new(path.clone(), tailer_config, listener);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            if let Err(error) = tailer.run(cancel).await {
                warn!(message = "tailer exited with error", path = %path.display(), %error);
            }
        });
        self.handles.lock().expect("factory handles mutex poisoned").push(handle);
        Ok(())
    }

    fn resolve_start(&self, path: &Path) -> StartFrom {
        match self.config.start_policy {
            StartPolicy::Beginning => StartFrom::Beginning,
            StartPolicy::End => StartFrom::End,
            StartPolicy::Explicit(n) => StartFrom::Offset(n),
            StartPolicy::Auto => match &self.position_store {
                Some(store) => match store.get(path) {
                    Ok(Some(offset)) => StartFrom::Offset(offset.max(0) as u64),
                    _ => StartFrom::Beginning,
                },
                None => StartFrom::Beginning,
            },
        }
    }

    /// Cancels every spawned tailer. Idempotent; does not block on the
    /// tailers actually finishing (they observe the token at their next
    /// sleep/read boundary, per §5).
    pub fn close(&self) {
        self.cancel.cancel();
        if let Some(store) = &self.position_store {
            store.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write as _;
    use tokio_stream::wrappers::ReceiverStream;
    use futures::StreamExt;

    #[tokio::test]
    async fn spawned_tailer_feeds_the_shared_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::File::create(&path).unwrap().write_all(b"one\ntwo\n").unwrap();

        let (factory, receiver) = TailerFactory::new(
            FactoryConfig {
                start_policy: StartPolicy::Beginning,
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
            None,
        );
        factory.spawn(path).unwrap();

        let mut stream = ReceiverStream::new(receiver);
        let first = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.unwrap().unwrap();
        assert_eq!(first.text, "one");
        assert_eq!(second.text, "two");

        factory.close();
    }
}
