use thiserror::Error;

use crate::target::TargetError;

/// An error that ends the session for a reason other than an orderly
/// detach or kill.
///
/// Per-packet target failures are not errors at this level: they are
/// reported to the debugger as `E<hh>` replies and the session carries on.
#[derive(Debug, Error)]
pub enum GdbServerError<C> {
    /// The byte stream to the debugger failed.
    #[error("connection error: {0}")]
    Connection(C),
    /// The back-end violated its contract; the process should terminate and
    /// let the debugger reconnect.
    #[error("target error: {0}")]
    Target(#[from] TargetError),
}
