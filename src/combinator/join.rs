//! Two-way join node.
//!
//! Runs two subtree futures concurrently and resolves when both are done,
//! or as soon as either finishes with a non-`Ok` outcome. The losing
//! sibling is dropped, which cancels it: every primitive in this crate
//! deregisters its waiters on drop, so an in-flight subtree unwinds with
//! no side effect on whatever it was suspended on.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::tracing_compat::trace;
use crate::types::Outcome;

/// A boxed subtree future aggregating leaf values in input order.
pub(crate) type NodeFuture<T, E> = Pin<Box<dyn Future<Output = Outcome<Vec<T>, E>>>>;

enum Branch<T, E> {
    Running(NodeFuture<T, E>),
    Done(Vec<T>),
}

/// Future joining two subtrees; the first non-`Ok` outcome wins and
/// cancels the sibling.
pub(crate) struct JoinTwo<T, E> {
    left: Option<Branch<T, E>>,
    right: Option<Branch<T, E>>,
}

// No structural pinning: the subtree futures are already boxed, and
// `Branch::Done` holds plain values. Without this the derive-style auto
// impl would demand `T: Unpin` through `Vec<T>`.
impl<T, E> Unpin for JoinTwo<T, E> {}

impl<T, E> JoinTwo<T, E> {
    pub(crate) fn new(left: NodeFuture<T, E>, right: NodeFuture<T, E>) -> Self {
        Self {
            left: Some(Branch::Running(left)),
            right: Some(Branch::Running(right)),
        }
    }
}

impl<T, E> JoinTwo<T, E> {
    /// Polls one side; a non-`Ok` resolution is handed back to the caller.
    fn poll_side(
        side: &mut Option<Branch<T, E>>,
        context: &mut Context<'_>,
    ) -> Option<Outcome<Vec<T>, E>> {
        if let Some(Branch::Running(future)) = side {
            match future.as_mut().poll(context) {
                Poll::Ready(Outcome::Ok(values)) => *side = Some(Branch::Done(values)),
                Poll::Ready(other) => return Some(other),
                Poll::Pending => {}
            }
        }
        None
    }
}

impl<T, E> Future for JoinTwo<T, E> {
    type Output = Outcome<Vec<T>, E>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let failed = Self::poll_side(&mut this.left, context)
            .or_else(|| Self::poll_side(&mut this.right, context));
        if let Some(outcome) = failed {
            trace!(
                severity = outcome.severity(),
                "join branch failed, cancelling sibling"
            );
            // Dropping both branches cancels the survivor.
            this.left = None;
            this.right = None;
            return Poll::Ready(outcome);
        }

        match (&this.left, &this.right) {
            (Some(Branch::Done(_)), Some(Branch::Done(_))) => {
                let Some(Branch::Done(mut values)) = this.left.take() else {
                    unreachable!("left branch checked done");
                };
                let Some(Branch::Done(right)) = this.right.take() else {
                    unreachable!("right branch checked done");
                };
                values.extend(right);
                Poll::Ready(Outcome::Ok(values))
            }
            _ => Poll::Pending,
        }
    }
}
