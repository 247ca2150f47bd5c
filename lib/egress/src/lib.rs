//! The bulk egress batcher (component J): coalesces accepted messages into
//! size/time-bounded batches with bounded in-flight concurrency.

mod batcher;
mod config;
mod document;
mod error;
mod transport;

pub use batcher::BulkEgress;
pub use config::BatcherConfig;
pub use error::Error;
pub use transport::{Action, BulkTransport, ReqwestTransport};
