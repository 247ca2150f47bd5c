use std::path::PathBuf;

use logalike_core::{ErrorKind, ErrorKindExt};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("store directory {path:?} exists and is not a directory"))]
    BadConfiguration { path: PathBuf },

    #[snafu(display("entry for {path:?} is locked by another process"))]
    ResourceBusy { path: PathBuf },

    #[snafu(display("io error for {path:?}: {source}"))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ErrorKindExt for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::BadConfiguration { .. } => ErrorKind::BadConfiguration,
            Error::ResourceBusy { .. } => ErrorKind::ResourceBusy,
            Error::Io { .. } => ErrorKind::TransientIo,
        }
    }
}
