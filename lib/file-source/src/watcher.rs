//! The positioned tailer (§4.B): an async state machine that follows one
//! file, detecting appends, rotations, and truncations.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::line::split_lines;

/// Where a newly-opened tailer should begin reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFrom {
    Beginning,
    End,
    Offset(u64),
}

/// The tailer's callback interface (§4.B): `{onLine, onRotated, onMissing,
/// onError, onPositionAdvanced}`.
#[async_trait::async_trait]
pub trait TailerListener: Send + Sync {
    async fn on_line(&self, path: &Path, line: String);
    async fn on_rotated(&self, _path: &Path) {}
    async fn on_missing(&self, _path: &Path) {}
    async fn on_error(&self, _path: &Path, _error: &std::io::Error) {}
    async fn on_position_advanced(&self, _path: &Path, _pos: u64) {}
}

/// Per-tailer configuration (§6 configuration surface).
#[derive(Debug, Clone)]
pub struct TailerConfig {
    pub poll_interval: Duration,
    pub start_from: StartFrom,
    pub buffer_size: usize,
    /// Reopen the file handle on every poll instead of holding it, for
    /// filesystems where a held handle inhibits deletion.
    pub reopen_each_poll: bool,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            start_from: StartFrom::End,
            buffer_size: 4096,
            reopen_each_poll: false,
        }
    }
}

impl TailerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.poll_interval.is_zero() {
            return crate::error::BadPollIntervalSnafu.fail();
        }
        if self.buffer_size == 0 {
            return crate::error::BadBufferSizeSnafu.fail();
        }
        Ok(())
    }
}

pub struct Tailer<L: TailerListener> {
    path: PathBuf,
    config: TailerConfig,
    listener: L,
}

impl<L: TailerListener> Tailer<L> {
    pub fn new(path: PathBuf, config: TailerConfig, listener: L) -> Self {
        Self {
            path,
            config,
            listener,
        }
    }

    /// Runs the poll loop until `cancel` is triggered or an unrecoverable
    /// I/O error occurs.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), Error> {
        let (mut file, mut pos) = loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.open_and_seek().await {
                Ok(opened) => break opened,
                Err(OpenOutcome::Missing) => {
                    self.listener.on_missing(&self.path).await;
                    if wait(&cancel, self.config.poll_interval).await.is_err() {
                        return Ok(());
                    }
                }
                Err(OpenOutcome::Io(error)) => {
                    self.listener.on_error(&self.path, &error).await;
                    return Err(Error::Io {
                        path: self.path.clone(),
                        source: error,
                    });
                }
            }
        };

        let mut last_seen = modified_time(&file).await;
        let mut buf: Vec<u8> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let newer = match modified_time(&file).await {
                Some(mtime) => Some(mtime) != last_seen,
                None => false,
            };

            let len = match file.metadata().await {
                Ok(metadata) => metadata.len(),
                Err(error) => {
                    self.listener.on_error(&self.path, &error).await;
                    return Err(Error::Io {
                        path: self.path.clone(),
                        source: error,
                    });
                }
            };

            if len < pos {
                debug!(message = "file shrank, treating as rotation", path = %self.path.display());
                self.listener.on_rotated(&self.path).await;
                match self.open_and_seek_from(0).await {
                    Ok((new_file, new_pos)) => {
                        file = new_file;
                        pos = new_pos;
                        buf.clear();
                        last_seen = modified_time(&file).await;
                    }
                    Err(OpenOutcome::Missing) => {
                        self.listener.on_missing(&self.path).await;
                        if wait(&cancel, self.config.poll_interval).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(OpenOutcome::Io(error)) => {
                        self.listener.on_error(&self.path, &error).await;
                        return Err(Error::Io {
                            path: self.path.clone(),
                            source: error,
                        });
                    }
                }
                continue;
            } else if len > pos {
                if let Err(error) = self.read_forward(&mut file, &mut pos, len, &mut buf).await {
                    self.listener.on_error(&self.path, &error).await;
                    return Err(Error::Io {
                        path: self.path.clone(),
                        source: error,
                    });
                }
                last_seen = modified_time(&file).await;
                continue;
            } else if newer {
                debug!(message = "file overwritten at same length", path = %self.path.display());
                if let Err(error) = file.seek(std::io::SeekFrom::Start(0)).await {
                    self.listener.on_error(&self.path, &error).await;
                    return Err(Error::Io {
                        path: self.path.clone(),
                        source: error,
                    });
                }
                pos = 0;
                buf.clear();
                last_seen = modified_time(&file).await;
                continue;
            }

            if self.config.reopen_each_poll {
                match File::open(&self.path).await {
                    Ok(reopened) => file = reopened,
                    Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                        self.listener.on_missing(&self.path).await;
                    }
                    Err(error) => {
                        self.listener.on_error(&self.path, &error).await;
                        return Err(Error::Io {
                            path: self.path.clone(),
                            source: error,
                        });
                    }
                }
            }

            if wait(&cancel, self.config.poll_interval).await.is_err() {
                return Ok(());
            }
        }
    }

    async fn open_and_seek(&self) -> Result<(File, u64), OpenOutcome> {
        let offset = match self.config.start_from {
            StartFrom::Beginning => 0,
            StartFrom::End => u64::MAX,
            StartFrom::Offset(n) => n,
        };
        self.open_and_seek_from(offset).await
    }

    async fn open_and_seek_from(&self, requested: u64) -> Result<(File, u64), OpenOutcome> {
        let mut file = File::open(&self.path).await.map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                OpenOutcome::Missing
            } else {
                OpenOutcome::Io(error)
            }
        })?;
        let len = file
            .metadata()
            .await
            .map_err(OpenOutcome::Io)?
            .len();
        let target = requested.min(len);
        let pos = file
            .seek(std::io::SeekFrom::Start(target))
            .await
            .map_err(OpenOutcome::Io)?;
        Ok((file, pos))
    }

    /// Reads forward from the current OS cursor (`*pos + buf.len()`) up to
    /// `len`, splitting complete lines out as they arrive. `*pos` only ever
    /// advances to the end of the last *complete* line; a trailing
    /// incomplete line's bytes stay in `buf` for the next cycle.
    async fn read_forward(
        &self,
        file: &mut File,
        pos: &mut u64,
        len: u64,
        buf: &mut Vec<u8>,
    ) -> std::io::Result<()> {
        let mut chunk = vec![0u8; self.config.buffer_size];
        let mut read_cursor = *pos + buf.len() as u64;
        while read_cursor < len {
            let to_read = chunk.len().min((len - read_cursor) as usize);
            let n = file.read(&mut chunk[..to_read]).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            read_cursor += n as u64;

            for split in split_lines(buf) {
                *pos += split.consumed as u64;
                let text = String::from_utf8_lossy(&split.line).into_owned();
                self.listener.on_line(&self.path, text).await;
                self.listener.on_position_advanced(&self.path, *pos).await;
            }
        }
        Ok(())
    }
}

enum OpenOutcome {
    Missing,
    Io(std::io::Error),
}

async fn modified_time(file: &File) -> Option<SystemTime> {
    file.metadata().await.ok().and_then(|m| m.modified().ok())
}

/// Sleeps for `duration` unless `cancel` fires first, in which case returns
/// `Err(())` so callers can exit promptly (§5 cancellation contract).
async fn wait(cancel: &CancellationToken, duration: Duration) -> Result<(), ()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write as _;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        lines: Mutex<Vec<String>>,
        rotations: Mutex<u32>,
        last_pos: Mutex<u64>,
    }

    #[async_trait::async_trait]
    impl TailerListener for std::sync::Arc<RecordingListener> {
        async fn on_line(&self, _path: &Path, line: String) {
            self.lines.lock().unwrap().push(line);
        }
        async fn on_rotated(&self, _path: &Path) {
            *self.rotations.lock().unwrap() += 1;
        }
        async fn on_position_advanced(&self, _path: &Path, pos: u64) {
            *self.last_pos.lock().unwrap() = pos;
        }
    }

    #[tokio::test]
    async fn preserves_line_order_and_final_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::File::create(&path).unwrap().write_all(b"a\nb\nc\n").unwrap();

        let listener = std::sync::Arc::new(RecordingListener::default());
        let cancel = CancellationToken::new();
        let tailer = Tailer::new(
            path,
            TailerConfig {
                start_from: StartFrom::Beginning,
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
            listener.clone(),
        );

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move { tailer.run(cancel_clone).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(*listener.lines.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(*listener.last_pos.lock().unwrap(), 6);
    }

    #[tokio::test]
    async fn detects_rotation_via_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::File::create(&path).unwrap().write_all(b"a\nb\nc\n").unwrap();

        let listener = std::sync::Arc::new(RecordingListener::default());
        let cancel = CancellationToken::new();
        let tailer = Tailer::new(
            path.clone(),
            TailerConfig {
                start_from: StartFrom::Beginning,
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
            listener.clone(),
        );

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move { tailer.run(cancel_clone).await });
        tokio::time::sleep(Duration::from_millis(80)).await;

        {
            let mut f = std::fs::OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
            f.write_all(b"x\n").unwrap();
        }
        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(*listener.rotations.lock().unwrap(), 1);
        assert_eq!(*listener.lines.lock().unwrap(), vec!["a", "b", "c", "x"]);
        assert_eq!(*listener.last_pos.lock().unwrap(), 2);
    }
}
