use logalike_core::{ErrorKind, ErrorKindExt};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("batch flush interval must be > 0"))]
    BadFlushInterval,

    #[snafu(display("batch max actions must be >= 1"))]
    BadMaxActions,

    #[snafu(display("batch max concurrency must be >= 1"))]
    BadMaxConcurrency,

    #[snafu(display("destination prefix must not be empty"))]
    BadDestinationPrefix,

    #[snafu(display("bulk request failed: {message}"))]
    Transport { message: String },
}

impl ErrorKindExt for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::BadFlushInterval
            | Error::BadMaxActions
            | Error::BadMaxConcurrency
            | Error::BadDestinationPrefix => ErrorKind::BadConfiguration,
            Error::Transport { .. } => ErrorKind::TransientIo,
        }
    }
}
