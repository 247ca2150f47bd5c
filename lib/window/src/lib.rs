//! The per-key tumbling-window aggregator (component F) shared by the
//! repetition and throttle processors.

mod aggregator;
mod window;

pub use aggregator::Aggregator;
pub use window::Window;
