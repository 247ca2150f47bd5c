use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::entry::{ensure_store_dir, Entry};
use crate::Error;

/// Crash-safe per-file byte offset persistence (§4.A).
///
/// One locked entry file per tracked path, named `hex(md5(absolute path))`
/// under `directory`. An entry's identity (creation time, or a
/// modified-time+length fallback) is captured when it is opened; a later
/// `get`/`set` against a path whose identity has changed is treated as a
/// brand-new file and the stale entry is discarded rather than reused.
pub struct PositionStore {
    directory: PathBuf,
    entries: Mutex<HashMap<PathBuf, Entry>>,
}

impl PositionStore {
    /// Opens `directory` as the backing store, creating it if absent.
    /// Fails with [`Error::BadConfiguration`] if it exists and is not a
    /// directory.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, Error> {
        let directory = directory.into();
        ensure_store_dir(&directory)?;
        Ok(Self {
            directory,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// The last persisted offset for `path`, or `None` if no entry exists
    /// yet, if the tracked file was recreated since the last `set`, or if
    /// the entry is locked by another process (demoted to "no
    /// persistence" rather than propagated as a hard error).
    pub fn get(&self, path: &Path) -> Result<Option<i64>, Error> {
        let mut entries = self.entries.lock().expect("position-store mutex poisoned");

        self.evict_if_stale(&mut entries, path)?;

        if !entries.contains_key(path) {
            match Entry::open(&self.directory, path) {
                Ok(entry) => {
                    entries.insert(path.to_path_buf(), entry);
                }
                Err(Error::ResourceBusy { path }) => {
                    debug!(message = "position-store entry locked by another process", path = %path.display());
                    return Ok(None);
                }
                Err(error) => return Err(error),
            }
        }

        entries.get_mut(path).expect("just inserted").read_offset()
    }

    /// Persists `offset` for `path`, creating the entry on first use.
    pub fn set(&self, path: &Path, offset: i64) -> Result<(), Error> {
        let mut entries = self.entries.lock().expect("position-store mutex poisoned");

        self.evict_if_stale(&mut entries, path)?;

        if !entries.contains_key(path) {
            let entry = Entry::open(&self.directory, path)?;
            entries.insert(path.to_path_buf(), entry);
        }

        entries.get_mut(path).expect("just inserted").write_offset(offset)
    }

    /// If the resident entry for `path` (if any) has gone stale — the
    /// tracked file's identity no longer matches the one captured when the
    /// entry was opened — drops it and discards its backing file on disk.
    ///
    /// Without the on-disk discard, a later `Entry::open` against the same
    /// `entry_file_name` (§4.A: named only from `path`, not from file
    /// identity) would reload the offset persisted by the previous,
    /// now-stale incarnation of the file instead of starting clean, which
    /// would silently defeat the identity check this is meant to enforce.
    fn evict_if_stale(&self, entries: &mut HashMap<PathBuf, Entry>, path: &Path) -> Result<(), Error> {
        if let Some(entry) = entries.get(path) {
            if entry.is_stale(path) {
                entries.remove(path);
                crate::entry::discard(&self.directory, path)?;
            }
        }
        Ok(())
    }

    /// Releases every held lock. Idempotent.
    pub fn close(&self) {
        self.entries
            .lock()
            .expect("position-store mutex poisoned")
            .clear();
    }
}
