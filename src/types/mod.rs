//! Core types shared across the toolkit.
//!
//! - [`Outcome`]: four-valued result of a concurrent computation
//! - [`CancelReason`] / [`CancelKind`]: why a computation was cancelled
//! - [`PanicPayload`]: a caught panic, transportable across task boundaries

mod cancel;
mod outcome;

pub use cancel::{CancelKind, CancelReason};
pub use outcome::{Outcome, OutcomeError, PanicPayload};
