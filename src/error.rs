//! Error types and error handling strategy.
//!
//! Error handling here follows a few principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Errors compose with the [`Outcome`](crate::types::Outcome) severity
//!   lattice; panics are isolated and surfaced as `Outcome::Panicked`
//! - Cancellation is a control outcome, carried separately from
//!   application errors but convertible into one at an API boundary
//!
//! Primitive-specific errors ([`AcquireError`], [`WaitError`]) stay local
//! to their modules; this crate-level type is the aggregation point for
//! callers that want one error type across primitives.

use core::fmt;

use crate::sync::semaphore::{AcquireError, TryAcquireError};
use crate::sync::waitable::WaitError;
use crate::types::CancelReason;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation was cancelled.
    Cancelled,
    /// A non-blocking attempt found the primitive busy (would block).
    WouldBlock,
    /// Caller passed arguments the operation cannot work with.
    InvalidArgument,
    /// Runtime bug or invalid internal state.
    Internal,
}

impl ErrorKind {
    /// Returns a static description of this error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::WouldBlock => "would block",
            Self::InvalidArgument => "invalid argument",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crate-level error carrying a kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
}

impl Error {
    /// Creates an error of the given kind with no extra context.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates an error of the given kind with a context message.
    #[must_use]
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

impl From<AcquireError> for Error {
    fn from(error: AcquireError) -> Self {
        match error {
            AcquireError::Cancelled => Self::new(ErrorKind::Cancelled),
        }
    }
}

impl From<WaitError> for Error {
    fn from(error: WaitError) -> Self {
        match error {
            WaitError::Cancelled => Self::new(ErrorKind::Cancelled),
        }
    }
}

impl From<TryAcquireError> for Error {
    fn from(_: TryAcquireError) -> Self {
        Self::new(ErrorKind::WouldBlock)
    }
}

impl From<CancelReason> for Error {
    fn from(reason: CancelReason) -> Self {
        Self::with_message(ErrorKind::Cancelled, reason.to_string())
    }
}

/// Convenience alias defaulting to the crate error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
