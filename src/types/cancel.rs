//! Cancellation reason and kind types.
//!
//! Cancellation in this toolkit is a control outcome, not an error value:
//! a suspended operation abandoned by its enclosing scope unwinds without
//! producing a result and without side effects on the structure it was
//! waiting on. These types describe why that happened.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit cancellation requested by user code.
    User,
    /// Cancellation due to a timeout or deadline.
    Timeout,
    /// Cancellation because a sibling in a join-group failed.
    FailFast,
    /// Cancellation because another branch of a race-group finished first.
    RaceLost,
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Timeout => write!(f, "timeout"),
            Self::FailFast => write!(f, "fail-fast"),
            Self::RaceLost => write!(f, "race lost"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message (static for determinism).
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates a timeout cancellation reason.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new(CancelKind::Timeout)
    }

    /// Creates a fail-fast cancellation reason (a join-group sibling failed).
    #[must_use]
    pub const fn sibling_failed() -> Self {
        Self::new(CancelKind::FailFast)
    }

    /// Creates a race-loser cancellation reason.
    #[must_use]
    pub const fn race_lost() -> Self {
        Self::new(CancelKind::RaceLost)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message {
            Some(msg) => write!(f, "{} ({msg})", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let reason = CancelReason::user("shutdown requested");
        assert_eq!(reason.to_string(), "user (shutdown requested)");

        let reason = CancelReason::timeout();
        assert_eq!(reason.to_string(), "timeout");
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(CancelReason::sibling_failed().kind, CancelKind::FailFast);
        assert_eq!(CancelReason::race_lost().kind, CancelKind::RaceLost);
        assert_eq!(CancelReason::timeout().kind, CancelKind::Timeout);
    }
}
