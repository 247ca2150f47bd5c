//! `logalike`: a long-running log-processing pipeline.
//!
//! This crate houses components G, H, and I — the repetition processor
//! (§4.G), the throttle processor (§4.H), and the pipeline runtime (§4.I)
//! that wires a [`logalike_core::Producer`] through a chain of
//! [`logalike_core::Processor`]s into a [`logalike_core::Consumer`]. The
//! leaf components (position store, file tailer, message, windowed
//! aggregator, bulk egress batcher) live in their own `logalike-*` crates
//! and are re-exported here for convenience.

mod pipeline;
mod repetition;
mod throttle;

pub use pipeline::PipelineRuntime;
pub use repetition::{RepetitionConfig, RepetitionProcessor};
pub use throttle::{SilentListener, ThrottleConfig, ThrottleListener, ThrottleProcessor, Transition};

pub use logalike_core::{
    BoxMessageStream, Chain, Clock, Consumer, ErrorKind, ErrorKindExt, IdentityProcessor,
    ManualClock, Processor, Producer, SystemClock,
};
pub use logalike_egress::{Action, BatcherConfig, BulkEgress, BulkTransport, ReqwestTransport};
pub use logalike_file_source::{
    default_line_decoder, FactoryConfig, FileInput, Line, StartFrom, StartPolicy, Tailer,
    TailerConfig, TailerFactory, TailerListener,
};
pub use logalike_message::{Destination, DestinationFrequency, Message, TypePolicy, Value, ValueKind};
pub use logalike_position_store::PositionStore;
pub use logalike_window::{Aggregator, Window};
