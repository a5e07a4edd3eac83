//! Fan-out/fan-in task combinators.
//!
//! [`waitfor_all`] runs a set of tasks concurrently and resolves when all
//! of them have finished; [`waitfor_first`] resolves as soon as one does.
//! Both dispatch through a recursive binary split: the task set is halved
//! into the two sides of a two-way join (or race) node, recursing until a
//! half holds exactly one task. The tree bounds nesting depth to
//! `O(log n)` regardless of fan-out width.
//!
//! Results are [`Outcome`](crate::types::Outcome)s: a task panic is
//! contained at its leaf and aggregated by severity rather than tearing
//! down the process.

pub mod fanout;
mod join;
mod race;

use std::future::Future;
use std::pin::Pin;

/// A boxed task body: the future a single fan-out leaf runs.
pub type TaskFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>>>>;

/// A deferred task: called once, at leaf dispatch, to produce the body.
pub type TaskFn<T, E> = Box<dyn FnOnce() -> TaskFuture<T, E>>;

pub use fanout::{waitfor_all, waitfor_all_each, waitfor_first, waitfor_first_each};
