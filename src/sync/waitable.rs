//! One-shot broadcast point.
//!
//! A [`Waitable`] is the rendezvous half of an event: computations suspend
//! on [`Waitable::wait`], and a later [`Waitable::emit`] resumes every one
//! of them with a clone of the emitted value. Waiters that arrive after an
//! emission are not affected by it; each emission resumes exactly the set
//! of computations suspended at that moment.
//!
//! There is no stored state here. For a level-triggered flag that late
//! arrivals can observe, see [`Condition`](crate::sync::Condition), which
//! layers a set/clear flag on top of this type.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;
use std::task::{Context, Poll, Waker};

use crate::cx::Cx;
use crate::tracing_compat::trace;

/// Error returned when a wait is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Cancelled while suspended.
    Cancelled,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "wait cancelled"),
        }
    }
}

impl std::error::Error for WaitError {}

/// A broadcast rendezvous: `emit` resumes every currently suspended waiter.
#[derive(Debug)]
pub struct Waitable<T> {
    state: StdMutex<WaitableState<T>>,
}

#[derive(Debug)]
struct WaitableState<T> {
    /// Waiters not yet covered by an emission, in arrival order.
    waiting: VecDeque<WaitSlot>,
    /// Values delivered to specific waiters, pending their next poll.
    delivered: Vec<(u64, T)>,
    next_id: u64,
}

#[derive(Debug)]
struct WaitSlot {
    id: u64,
    waker: Option<Waker>,
}

impl<T: Clone> Waitable<T> {
    /// Creates a waitable with no suspended waiters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(WaitableState {
                waiting: VecDeque::new(),
                delivered: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Returns the number of computations currently suspended on this value.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.state.lock().expect("waitable lock poisoned").waiting.len()
    }

    /// Resumes every currently suspended waiter with a clone of `value`.
    ///
    /// The set of waiters is captured atomically; a computation that
    /// suspends during or after this call waits for the next emission.
    pub fn emit(&self, value: &T) {
        let wakers = {
            let mut guard = self.state.lock().expect("waitable lock poisoned");
            let state = &mut *guard;
            trace!(waiters = state.waiting.len(), "waitable emit");
            let mut wakers = Vec::with_capacity(state.waiting.len());
            for mut slot in state.waiting.drain(..) {
                state.delivered.push((slot.id, value.clone()));
                if let Some(waker) = slot.waker.take() {
                    wakers.push(waker);
                }
            }
            wakers
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Suspends until the next emission, resolving to the emitted value.
    pub fn wait<'a, 'b>(&'a self, cx: &'b Cx) -> WaitFuture<'a, 'b, T> {
        WaitFuture {
            waitable: self,
            cx,
            waiter_id: None,
        }
    }

    fn remove_waiter(&self, id: u64) {
        let mut guard = self.state.lock().expect("waitable lock poisoned");
        let state = &mut *guard;
        if let Some(pos) = state.waiting.iter().position(|slot| slot.id == id) {
            state.waiting.remove(pos);
        }
        // A delivered-but-unobserved value is dropped with its waiter.
        state.delivered.retain(|(slot_id, _)| *slot_id != id);
    }
}

impl<T: Clone> Default for Waitable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Waitable::wait`].
#[derive(Debug)]
pub struct WaitFuture<'a, 'b, T> {
    waitable: &'a Waitable<T>,
    cx: &'b Cx,
    waiter_id: Option<u64>,
}

impl<T: Clone> Future for WaitFuture<'_, '_, T> {
    type Output = Result<T, WaitError>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.cx.checkpoint().is_err() {
            if let Some(id) = this.waiter_id.take() {
                this.waitable.remove_waiter(id);
            }
            return Poll::Ready(Err(WaitError::Cancelled));
        }

        let mut guard = this
            .waitable
            .state
            .lock()
            .expect("waitable lock poisoned");
        let state = &mut *guard;

        let Some(id) = this.waiter_id else {
            let id = state.next_id;
            state.next_id = state.next_id.wrapping_add(1);
            state.waiting.push_back(WaitSlot {
                id,
                waker: Some(context.waker().clone()),
            });
            this.waiter_id = Some(id);
            return Poll::Pending;
        };

        if let Some(pos) = state.delivered.iter().position(|(slot_id, _)| *slot_id == id) {
            let (_, value) = state.delivered.swap_remove(pos);
            this.waiter_id = None;
            return Poll::Ready(Ok(value));
        }

        if let Some(slot) = state.waiting.iter_mut().find(|slot| slot.id == id) {
            slot.waker = Some(context.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> Drop for WaitFuture<'_, '_, T> {
    fn drop(&mut self) {
        if let Some(id) = self.waiter_id.take() {
            let mut guard = self
                .waitable
                .state
                .lock()
                .expect("waitable lock poisoned");
            let state = &mut *guard;
            if let Some(pos) = state.waiting.iter().position(|slot| slot.id == id) {
                state.waiting.remove(pos);
            }
            state.delivered.retain(|(slot_id, _)| *slot_id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_logging, poll_once, test_cx};
    use crate::types::CancelReason;

    #[test]
    fn emit_resumes_all_suspended_waiters() {
        init_test_logging();
        let cx = test_cx();
        let event: Waitable<u32> = Waitable::new();

        let mut a = event.wait(&cx);
        let mut b = event.wait(&cx);
        assert!(poll_once(&mut a).is_pending());
        assert!(poll_once(&mut b).is_pending());

        event.emit(&7);
        assert_eq!(poll_once(&mut a), Poll::Ready(Ok(7)));
        assert_eq!(poll_once(&mut b), Poll::Ready(Ok(7)));
    }

    #[test]
    fn late_waiter_misses_earlier_emission() {
        init_test_logging();
        let cx = test_cx();
        let event: Waitable<&'static str> = Waitable::new();

        event.emit(&"early");
        let mut late = event.wait(&cx);
        assert!(poll_once(&mut late).is_pending());

        event.emit(&"next");
        assert_eq!(poll_once(&mut late), Poll::Ready(Ok("next")));
    }

    #[test]
    fn each_emission_covers_exactly_its_waiters() {
        init_test_logging();
        let cx = test_cx();
        let event: Waitable<u32> = Waitable::new();

        let mut first = event.wait(&cx);
        assert!(poll_once(&mut first).is_pending());
        event.emit(&1);

        let mut second = event.wait(&cx);
        assert!(poll_once(&mut second).is_pending());
        event.emit(&2);

        assert_eq!(poll_once(&mut first), Poll::Ready(Ok(1)));
        assert_eq!(poll_once(&mut second), Poll::Ready(Ok(2)));
    }

    #[test]
    fn cancellation_unwinds_without_consuming_anything() {
        init_test_logging();
        let cx = test_cx();
        let event: Waitable<u32> = Waitable::new();

        let mut fut = event.wait(&cx);
        assert!(poll_once(&mut fut).is_pending());

        cx.cancel(CancelReason::user("test cancel"));
        assert_eq!(poll_once(&mut fut), Poll::Ready(Err(WaitError::Cancelled)));
        assert_eq!(event.waiter_count(), 0);
    }

    #[test]
    fn dropping_wait_future_removes_its_slot() {
        init_test_logging();
        let cx = test_cx();
        let event: Waitable<u32> = Waitable::new();

        let fut = event.wait(&cx);
        let mut fut = fut;
        assert!(poll_once(&mut fut).is_pending());
        drop(fut);
        assert_eq!(event.waiter_count(), 0);
    }
}
