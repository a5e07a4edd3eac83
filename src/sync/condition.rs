//! Level-triggered condition flag.
//!
//! A [`Condition`] pairs a [`Waitable`] with a set/clear flag and a stored
//! value. While the flag is set, [`Condition::wait`] resolves immediately
//! with the stored value; while clear, waiters suspend until the next
//! [`Condition::set`]. Unlike a bare `Waitable`, a computation that arrives
//! after the flag was set still observes it.
//!
//! Setting an already-set condition is a no-op: the stored value is kept
//! and no emission happens.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;
use std::task::{Context, Poll};

use crate::cx::Cx;
use crate::sync::waitable::{WaitError, WaitFuture, Waitable};
use crate::tracing_compat::trace;

/// A broadcast event with a persistent set/clear flag and stored value.
#[derive(Debug)]
pub struct Condition<T> {
    event: Waitable<T>,
    state: StdMutex<ConditionState<T>>,
}

#[derive(Debug)]
struct ConditionState<T> {
    is_set: bool,
    value: Option<T>,
}

impl<T: Clone> Condition<T> {
    /// Creates a condition in the clear state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            event: Waitable::new(),
            state: StdMutex::new(ConditionState {
                is_set: false,
                value: None,
            }),
        }
    }

    /// Returns true while the condition is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.lock().expect("condition lock poisoned").is_set
    }

    /// Returns a clone of the stored value, if the condition is set.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        let guard = self.state.lock().expect("condition lock poisoned");
        if guard.is_set {
            guard.value.clone()
        } else {
            None
        }
    }

    /// Sets the condition and resumes every suspended waiter with `value`.
    ///
    /// Returns false (and changes nothing) if the condition was already set.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.state.lock().expect("condition lock poisoned");
            if guard.is_set {
                trace!("condition already set, ignoring");
                return false;
            }
            guard.is_set = true;
            guard.value = Some(value.clone());
        }
        self.event.emit(&value);
        true
    }

    /// Clears the condition, discarding the stored value.
    ///
    /// Waiters that already resumed keep their value; new waiters suspend.
    pub fn clear(&self) {
        let mut guard = self.state.lock().expect("condition lock poisoned");
        guard.is_set = false;
        guard.value = None;
    }

    /// Resolves with the stored value once the condition is set.
    ///
    /// Returns immediately if it is set already.
    pub fn wait<'a, 'b>(&'a self, cx: &'b Cx) -> ConditionWait<'a, 'b, T> {
        ConditionWait {
            condition: self,
            cx,
            inner: None,
        }
    }

    fn set_value(&self) -> Option<T> {
        let guard = self.state.lock().expect("condition lock poisoned");
        if guard.is_set {
            Some(
                guard
                    .value
                    .clone()
                    .expect("condition value present while set"),
            )
        } else {
            None
        }
    }
}

impl<T: Clone> Default for Condition<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Condition::wait`].
#[derive(Debug)]
pub struct ConditionWait<'a, 'b, T> {
    condition: &'a Condition<T>,
    cx: &'b Cx,
    inner: Option<WaitFuture<'a, 'b, T>>,
}

impl<T: Clone> Future for ConditionWait<'_, '_, T> {
    type Output = Result<T, WaitError>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.cx.checkpoint().is_err() {
            this.inner = None;
            return Poll::Ready(Err(WaitError::Cancelled));
        }

        if this.inner.is_none() {
            if let Some(value) = this.condition.set_value() {
                return Poll::Ready(Ok(value));
            }
            this.inner = Some(this.condition.event.wait(this.cx));
        }

        let inner = this.inner.as_mut().expect("inner wait registered");
        match Pin::new(inner).poll(context) {
            Poll::Ready(result) => {
                this.inner = None;
                Poll::Ready(result)
            }
            Poll::Pending => {
                // The condition may have been set between the flag check
                // and the registration above; re-check so the emission is
                // never missed.
                if let Some(value) = this.condition.set_value() {
                    this.inner = None;
                    return Poll::Ready(Ok(value));
                }
                Poll::Pending
            }
        }
    }
}
