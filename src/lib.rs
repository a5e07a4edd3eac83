//! Coopsync: cancel-safe structured-concurrency primitives for cooperative runtimes.
//!
//! # Overview
//!
//! Coopsync is a small toolkit of concurrency-control building blocks for
//! single-threaded cooperative scheduling: counting semaphores with strict
//! FIFO fairness, broadcast events, bounded queues, fan-out/fan-in task
//! combinators, and a continuation-capture escape hatch for deferred
//! teardown. Every blocking operation is cancel-safe by construction: a
//! waiter abandoned mid-suspension deregisters itself with no side effect
//! on the structure it was waiting on.
//!
//! # Core Guarantees
//!
//! - **Strict FIFO fairness**: semaphore waiters are served in arrival
//!   order; nothing barges past the queue
//! - **Resume-or-cancel atomicity**: a waiter is either fully resumed or
//!   fully cancelled, never both
//! - **Fail-fast fan-out**: the first failure in a join-group cancels the
//!   surviving siblings; panics are contained per leaf and aggregated by
//!   severity
//! - **Leak visibility**: an unresumed continuation parks its background
//!   task where [`Runtime::live_tasks`](runtime::Runtime::live_tasks) can
//!   see it
//!
//! # Module Structure
//!
//! - [`types`]: core types (outcomes, cancellation reasons)
//! - [`cx`]: cancellation context checked at suspension points
//! - [`runtime`]: the single-threaded cooperative executor
//! - [`sync`]: semaphore, waitable, condition, and queue primitives
//! - [`combinator`]: `waitfor_all` / `waitfor_first` binary-tree dispatch
//! - [`breaking`]: continuation capture for deferred teardown
//! - [`util`]: internal utilities (generational arena)
//! - [`error`]: crate-level error types
//! - [`tracing_compat`]: logging facade, no-op without the
//!   `tracing-integration` feature

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]

pub mod breaking;
pub mod combinator;
pub mod cx;
pub mod error;
pub mod runtime;
pub mod sync;
pub mod test_utils;
pub mod tracing_compat;
pub mod types;
pub mod util;

pub use breaking::{breaking, Breaking, Escape, Resume};
pub use combinator::{waitfor_all, waitfor_all_each, waitfor_first, waitfor_first_each};
pub use cx::Cx;
pub use error::{Error, ErrorKind};
pub use runtime::{Runtime, Spawner};
pub use sync::{Condition, Queue, Semaphore, Waitable};
pub use types::Outcome;
