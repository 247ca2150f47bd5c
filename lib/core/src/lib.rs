//! Shared error taxonomy, clock abstraction, and the producer/processor/
//! consumer contracts every pipeline stage is built against (§6, §7).

mod clock;
mod contract;
mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contract::{BoxMessageStream, Chain, Consumer, IdentityProcessor, Processor, Producer};
pub use error::{ErrorKind, ErrorKindExt};
