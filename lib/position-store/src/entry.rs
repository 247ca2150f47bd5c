use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;
use tracing::debug;

use crate::error::{BadConfigurationSnafu, ResourceBusySnafu};
use crate::Error;

/// The signal used to detect that a tracked file was recreated in place
/// (rotation with path reuse). Prefers the filesystem's reported creation
/// time; falls back to `(modified time, length)` at entry-open time on
/// filesystems that don't report one (§4.A expansion, resolves Open
/// Question 1 in spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum IdentityStamp {
    Created(SystemTime),
    ModifiedLen(SystemTime, u64),
}

impl IdentityStamp {
    pub(crate) fn capture(tracked_path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(tracked_path)?;
        match metadata.created() {
            Ok(created) => Ok(IdentityStamp::Created(created)),
            Err(_) => {
                debug!(
                    message = "filesystem does not report file creation time; falling back to modified-time+length identity",
                    path = %tracked_path.display(),
                );
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Ok(IdentityStamp::ModifiedLen(modified, metadata.len()))
            }
        }
    }
}

/// The store-file name is the hex digest of the absolute tracked path (§4.A,
/// §6): fixed width, so any legal path is representable.
pub(crate) fn entry_file_name(tracked_path: &Path) -> String {
    format!("{:x}", md5::compute(tracked_path.display().to_string().as_bytes()))
}

/// Deletes the on-disk entry file for `tracked_path`, if one exists.
///
/// The entry file is named only from `tracked_path` (§4.A), not from the
/// tracked file's identity, so a stale entry's backing file still holds the
/// offset persisted by the previous incarnation of the file. Called once an
/// identity change has been detected, before a fresh `Entry` is opened in
/// its place, so that fresh entry starts from "no offset" rather than
/// inheriting those stale bytes.
pub(crate) fn discard(store_dir: &Path, tracked_path: &Path) -> Result<(), Error> {
    let entry_path = store_dir.join(entry_file_name(tracked_path));
    match std::fs::remove_file(&entry_path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Io {
            path: tracked_path.to_path_buf(),
            source,
        }),
    }
}

/// An exclusively-locked handle on one tracked file's persisted offset.
pub(crate) struct Entry {
    file: File,
    identity: IdentityStamp,
    tracked_path: PathBuf,
}

impl Entry {
    /// Open (creating if absent) and exclusively lock the entry file for
    /// `tracked_path`, capturing its identity at this moment.
    pub(crate) fn open(store_dir: &Path, tracked_path: &Path) -> Result<Self, Error> {
        let identity = IdentityStamp::capture(tracked_path).context_io(tracked_path)?;
        let entry_path = store_dir.join(entry_file_name(tracked_path));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&entry_path)
            .map_err(|source| Error::Io {
                path: tracked_path.to_path_buf(),
                source,
            })?;

        file.try_lock_exclusive().map_err(|_| {
            ResourceBusySnafu {
                path: tracked_path.to_path_buf(),
            }
            .build()
        })?;

        Ok(Self {
            file,
            identity,
            tracked_path: tracked_path.to_path_buf(),
        })
    }

    /// Returns `true` if `tracked_path`'s current identity no longer matches
    /// the one captured when this entry was opened.
    pub(crate) fn is_stale(&self, tracked_path: &Path) -> bool {
        match IdentityStamp::capture(tracked_path) {
            Ok(current) => current != self.identity,
            Err(_) => true,
        }
    }

    pub(crate) fn read_offset(&mut self) -> Result<Option<i64>, Error> {
        let mut buf = [0u8; 8];
        self.file.seek(SeekFrom::Start(0)).context_io(&self.tracked_path)?;
        match self.file.read_exact(&mut buf) {
            Ok(()) => Ok(Some(i64::from_be_bytes(buf))),
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(Error::Io {
                path: self.tracked_path.clone(),
                source,
            }),
        }
    }

    pub(crate) fn write_offset(&mut self, offset: i64) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(0)).context_io(&self.tracked_path)?;
        self.file
            .write_all(&offset.to_be_bytes())
            .context_io(&self.tracked_path)?;
        self.file.sync_all().context_io(&self.tracked_path)
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

pub(crate) fn ensure_store_dir(dir: &Path) -> Result<(), Error> {
    if dir.exists() {
        if !dir.is_dir() {
            return BadConfigurationSnafu {
                path: dir.to_path_buf(),
            }
            .fail();
        }
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })
}

trait IoContext<T> {
    fn context_io(self, path: &Path) -> Result<T, Error>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn context_io(self, path: &Path) -> Result<T, Error> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
