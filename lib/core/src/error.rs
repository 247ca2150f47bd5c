/// The error taxonomy shared across every crate boundary (§7).
///
/// Each crate defines its own `#[derive(Snafu)] enum Error` and implements
/// [`ErrorKindExt`] so callers can match on *kind* without matching on every
/// concrete variant a given crate happens to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File not found at poll, enqueue timeout, egress batch failure. Logged
    /// at warn/error; the loop continues.
    TransientIo,
    /// Not really an error — signalled via a listener callback, triggers a
    /// reopen. Kept in the taxonomy so call sites that log by kind don't need
    /// a special case for it.
    RotationDetected,
    /// Non-positive durations, empty destination prefix, non-directory store
    /// path. Raised at setup time; fails startup.
    BadConfiguration,
    /// Position-store lock contention. Demotes to "no persistence for this
    /// file"; the caller continues.
    ResourceBusy,
    /// A message write policy rejected a field of the wrong declared type.
    TypeMismatch,
    /// A message write policy rejected a field absent from the type table.
    UnknownField,
    /// A blocking wait observed the close flag and exited promptly. Not
    /// logged as an error.
    InterruptedShutdown,
}

pub trait ErrorKindExt {
    fn kind(&self) -> ErrorKind;
}
