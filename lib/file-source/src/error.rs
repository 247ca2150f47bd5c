use std::path::PathBuf;

use logalike_core::{ErrorKind, ErrorKindExt};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("tailer poll interval must be > 0"))]
    BadPollInterval,

    #[snafu(display("tailer read buffer size must be >= 1 byte"))]
    BadBufferSize,

    #[snafu(display("io error tailing {path:?}: {source}"))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ErrorKindExt for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::BadPollInterval | Error::BadBufferSize => ErrorKind::BadConfiguration,
            Error::Io { .. } => ErrorKind::TransientIo,
        }
    }
}
