//! Two-way race node.
//!
//! Resolves with whichever subtree finishes first, value or failure alike,
//! and drops the loser. Dropping is the cancellation mechanism: a dropped
//! subtree deregisters every waiter it holds with no side effect.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::tracing_compat::trace;
use crate::types::Outcome;

/// A boxed subtree future resolving to a single leaf's outcome.
pub(crate) type RaceNodeFuture<T, E> = Pin<Box<dyn Future<Output = Outcome<T, E>>>>;

/// Future racing two subtrees; the first to finish wins at this node.
pub(crate) struct RaceTwo<T, E> {
    left: Option<RaceNodeFuture<T, E>>,
    right: Option<RaceNodeFuture<T, E>>,
}

impl<T, E> RaceTwo<T, E> {
    pub(crate) fn new(left: RaceNodeFuture<T, E>, right: RaceNodeFuture<T, E>) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }
}

impl<T, E> Future for RaceTwo<T, E> {
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(left) = &mut this.left {
            if let Poll::Ready(outcome) = left.as_mut().poll(context) {
                trace!(severity = outcome.severity(), "race won by left branch");
                this.left = None;
                this.right = None;
                return Poll::Ready(outcome);
            }
        }
        if let Some(right) = &mut this.right {
            if let Poll::Ready(outcome) = right.as_mut().poll(context) {
                trace!(severity = outcome.severity(), "race won by right branch");
                this.left = None;
                this.right = None;
                return Poll::Ready(outcome);
            }
        }
        Poll::Pending
    }
}
