//! Unified error types for the driver core.
//!
//! Every caller-facing operation funnels into [`Error`], so a workflow
//! entry point can surface transport faults, argument validation and
//! state violations through one type.  All variants are `Copy`; they
//! cross thread boundaries (event pump, timer worker) without allocation.

use core::fmt;

use crate::transport::IoError;

// ---------------------------------------------------------------------------
// Top-level driver error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The transport reported a fault.  Never retried by the core.
    Io(IoError),
    /// An enumerated input had no firmware encoding.  Raised before any
    /// command is sent.
    InvalidArgument(&'static str),
    /// The request is recognised but this driver does not implement it.
    NotSupported(u32),
    /// A scan was requested while another one is running.
    Busy,
    /// The operation or completion was observed outside its valid state.
    /// Bounded-wait expiry lands here too.
    InvalidState(&'static str),
    /// The scan is still running; poll again later.
    Retry,
    /// Firmware reported a non-success association status.
    AssociationFailed(u32),
    /// A request buffer could not be allocated.
    OutOfMemory,
    /// An inbound frame's declared lengths disagree with its size.
    /// Only ever produced on the event-delivery side.
    MalformedFrame(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O: {e}"),
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::NotSupported(code) => write!(f, "unsupported request {code}"),
            Self::Busy => write!(f, "scan already running"),
            Self::InvalidState(what) => write!(f, "invalid state: {what}"),
            Self::Retry => write!(f, "operation in progress, try again"),
            Self::AssociationFailed(status) => write!(f, "association failed (status {status})"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::MalformedFrame(what) => write!(f, "malformed frame: {what}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Driver-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
