//! Counting semaphore with strict FIFO fairness.
//!
//! A semaphore bounds concurrent access through permits: `acquire` consumes
//! one, `release` replenishes one. Waiters are served strictly in arrival
//! order; a fresh `acquire` or `try_acquire` never barges past a queued
//! waiter even when a permit is momentarily free.
//!
//! # Release handoff
//!
//! The `sync` construction flag selects what `release` does with a freed
//! permit when waiters are queued:
//!
//! - `sync == true` — **direct handoff**: the permit is transferred to the
//!   oldest waiter before `release` returns. [`Semaphore::permits`] does not
//!   rise and nothing can claim the permit in between; the waiter completes
//!   on its next poll without re-contending. Lower latency, tighter coupling
//!   between releaser and waiter.
//! - `sync == false` — **queued wakeup**: the permit is returned to the pool
//!   and the oldest waiter is woken. The releaser's own code runs to
//!   completion first; the waiter claims the permit when the scheduler polls
//!   it.
//!
//! In both modes a handoff transfers ownership of the permit only. The
//! waiter's continuation runs when the scheduler next polls it, never
//! inline inside `release`.
//!
//! # Cancel Safety
//!
//! Dropping a pending [`AcquireFuture`] (or a failed [`Cx::checkpoint`])
//! removes the waiter from the queue with no permit consumed. If the waiter
//! had already been handed a permit it never observed, the permit is passed
//! on exactly as a fresh `release` would — a waiter is either fully resumed
//! or fully cancelled, never both.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;
use std::task::{Context, Poll, Waker};

use crate::cx::Cx;
use crate::tracing_compat::trace;

/// Error returned when a semaphore acquisition is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// Cancelled while waiting.
    Cancelled,
}

impl std::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "semaphore acquire cancelled"),
        }
    }
}

impl std::error::Error for AcquireError {}

/// Error returned by a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryAcquireError;

impl std::fmt::Display for TryAcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no semaphore permits available")
    }
}

impl std::error::Error for TryAcquireError {}

/// A counting semaphore with FIFO waiter ordering.
#[derive(Debug)]
pub struct Semaphore {
    state: StdMutex<SemaphoreState>,
    sync: bool,
}

#[derive(Debug)]
struct SemaphoreState {
    /// Permits available to the pool (direct handoffs bypass this count).
    permits: usize,
    /// FIFO queue of suspended acquirers.
    waiters: VecDeque<Waiter>,
    /// Next waiter id; ids disambiguate structurally equal waiters.
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Option<Waker>,
    /// A permit was handed directly to this waiter and awaits its next poll.
    granted: bool,
}

impl SemaphoreState {
    /// Converts pooled permits into direct grants while both a pooled
    /// permit and an ungranted waiter exist.
    ///
    /// A permit can end up pooled with waiters still queued: a release
    /// finds every queued waiter already granted, then a new waiter
    /// enqueues behind them. Without this sweep on each departure that
    /// waiter would suspend forever. Returns the wakers to wake once the
    /// lock is dropped.
    fn grant_pooled(&mut self) -> Vec<Waker> {
        let mut wakers = Vec::new();
        while self.permits > 0 {
            let Some(waiter) = self.waiters.iter_mut().find(|w| !w.granted) else {
                break;
            };
            self.permits -= 1;
            waiter.granted = true;
            trace!(waiter = waiter.id, "semaphore direct handoff");
            if let Some(waker) = waiter.waker.take() {
                wakers.push(waker);
            }
        }
        wakers
    }
}

impl Semaphore {
    /// Creates a semaphore with `permits` initial permits.
    ///
    /// `sync` selects the release handoff discipline (see module docs).
    #[must_use]
    pub fn new(permits: usize, sync: bool) -> Self {
        Self {
            state: StdMutex::new(SemaphoreState {
                permits,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
            sync,
        }
    }

    /// Returns the number of permits currently available to the pool.
    ///
    /// Permits already handed off to a waiter (direct handoff) are not
    /// counted; they belong to that waiter.
    #[must_use]
    pub fn permits(&self) -> usize {
        self.state.lock().expect("semaphore lock poisoned").permits
    }

    /// Returns true if this semaphore uses direct handoff on release.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        self.sync
    }

    /// Returns the number of suspended acquirers.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.state
            .lock()
            .expect("semaphore lock poisoned")
            .waiters
            .len()
    }

    /// Acquires one permit, suspending while none is available.
    ///
    /// Resolves to `Err(AcquireError::Cancelled)` only if the context is
    /// cancelled while waiting; it never fails otherwise. Dropping the
    /// returned future removes the waiter cleanly.
    pub fn acquire<'a, 'b>(&'a self, cx: &'b Cx) -> AcquireFuture<'a, 'b> {
        AcquireFuture {
            semaphore: self,
            cx,
            waiter_id: None,
        }
    }

    /// Claims a permit without suspending.
    ///
    /// Fails when no permit is free or when waiters are queued — strict
    /// FIFO means nobody barges past the queue.
    pub fn try_acquire(&self) -> Result<(), TryAcquireError> {
        let mut state = self.state.lock().expect("semaphore lock poisoned");
        if !state.waiters.is_empty() || state.permits == 0 {
            return Err(TryAcquireError);
        }
        state.permits -= 1;
        Ok(())
    }

    /// Returns one permit, resuming the oldest waiter if any.
    pub fn release(&self) {
        let wakers = {
            let mut guard = self.state.lock().expect("semaphore lock poisoned");
            let state = &mut *guard;
            state.permits += 1;
            if self.sync {
                state.grant_pooled()
            } else {
                state
                    .waiters
                    .iter_mut()
                    .find(|w| !w.granted)
                    .and_then(|waiter| waiter.waker.take())
                    .into_iter()
                    .collect()
            }
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Runs `f` under one permit.
    ///
    /// The permit is released on every exit path: normal return, panic
    /// unwind, and cancellation of the whole call mid-critical-section.
    pub async fn synchronize<R, F, Fut>(&self, cx: &Cx, f: F) -> Result<R, AcquireError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        self.acquire(cx).await?;
        let guard = ReleaseGuard { semaphore: self };
        let output = f().await;
        drop(guard);
        Ok(output)
    }

    /// Removes a waiter by id, redistributing an unobserved grant.
    fn remove_waiter(&self, id: u64) {
        let wakers = {
            let mut guard = self.state.lock().expect("semaphore lock poisoned");
            let state = &mut *guard;
            let Some(pos) = state.waiters.iter().position(|w| w.id == id) else {
                return;
            };
            let removed = state.waiters.remove(pos).expect("position in bounds");
            if removed.granted {
                // The handoff was never observed; return the permit and
                // pass it on the same way a fresh release would.
                state.permits += 1;
            }
            if self.sync {
                state.grant_pooled()
            } else if state.permits > 0 && (removed.granted || pos == 0) {
                // A permit is free and the departure may have unblocked
                // the queue head; let the next waiter claim it.
                state
                    .waiters
                    .iter_mut()
                    .find(|w| !w.granted)
                    .and_then(|next| next.waker.take())
                    .into_iter()
                    .collect()
            } else {
                Vec::new()
            }
        };
        for waker in wakers {
            waker.wake();
        }
    }
}

struct ReleaseGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Future returned by [`Semaphore::acquire`].
#[derive(Debug)]
pub struct AcquireFuture<'a, 'b> {
    semaphore: &'a Semaphore,
    cx: &'b Cx,
    waiter_id: Option<u64>,
}

impl Future for AcquireFuture<'_, '_> {
    type Output = Result<(), AcquireError>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.cx.checkpoint().is_err() {
            if let Some(id) = this.waiter_id.take() {
                this.semaphore.remove_waiter(id);
            }
            return Poll::Ready(Err(AcquireError::Cancelled));
        }

        let mut guard = this
            .semaphore
            .state
            .lock()
            .expect("semaphore lock poisoned");
        let state = &mut *guard;

        let Some(id) = this.waiter_id else {
            // Fast path: a free permit and nobody queued ahead of us.
            if state.waiters.is_empty() && state.permits > 0 {
                state.permits -= 1;
                return Poll::Ready(Ok(()));
            }
            let id = state.next_waiter_id;
            state.next_waiter_id = state.next_waiter_id.wrapping_add(1);
            state.waiters.push_back(Waiter {
                id,
                waker: Some(context.waker().clone()),
                granted: false,
            });
            this.waiter_id = Some(id);
            return Poll::Pending;
        };

        let Some(pos) = state.waiters.iter().position(|w| w.id == id) else {
            // Only this future removes its own entry, so a missing entry
            // means the state machine is broken.
            unreachable!("semaphore waiter entry vanished while suspended");
        };

        if state.waiters[pos].granted {
            state.waiters.remove(pos);
            this.waiter_id = None;
            // A permit pooled while every queued waiter was granted can
            // only reach later waiters through a departure; sweep now.
            let wakers = state.grant_pooled();
            drop(guard);
            for waker in wakers {
                waker.wake();
            }
            return Poll::Ready(Ok(()));
        }

        if !this.semaphore.sync && pos == 0 && state.permits > 0 {
            state.permits -= 1;
            state.waiters.remove(pos);
            this.waiter_id = None;
            // Several releases may have accumulated; cascade to the next
            // waiter so queued wakeups do not stall.
            let waker = if state.permits > 0 {
                state
                    .waiters
                    .iter_mut()
                    .find(|w| !w.granted)
                    .and_then(|next| next.waker.take())
            } else {
                None
            };
            drop(guard);
            if let Some(waker) = waker {
                waker.wake();
            }
            return Poll::Ready(Ok(()));
        }

        if let Some(waiter) = state.waiters.get_mut(pos) {
            waiter.waker = Some(context.waker().clone());
        }
        Poll::Pending
    }
}

impl Drop for AcquireFuture<'_, '_> {
    fn drop(&mut self) {
        if let Some(id) = self.waiter_id.take() {
            self.semaphore.remove_waiter(id);
        }
    }
}
