//! Continuation capture for deferred teardown.
//!
//! [`breaking`] runs a setup/use/teardown block as a detached background
//! task and lets the block hand an intermediate value out to the caller
//! while its own teardown scope stays open. The block receives an
//! [`Escape`] handle; when it fires the handle with a value, the caller's
//! `breaking` call resolves to [`Breaking::Escaped`] carrying that value
//! and a single-use [`Resume`] handle, while the block suspends at the
//! escape point. Calling [`Resume::resume`] later lets the block's
//! remainder (teardown included) run; [`Resume::fail`] instead surfaces an
//! error at the escape point inside the block, so enclosing error handling
//! there still fires.
//!
//! If the block finishes without firing the handle, `breaking` resolves to
//! [`Breaking::Completed`] with the block's return value, like an ordinary
//! call.
//!
//! # Leaks
//!
//! The resume handle must be used exactly once. Single use is enforced by
//! consumption; *at least* once is not enforceable — dropping the handle
//! parks the background task forever, along with everything its scope
//! holds. The drop is logged, and the parked task stays visible in
//! [`Runtime::live_tasks`](crate::runtime::Runtime::live_tasks).

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::runtime::Spawner;
use crate::tracing_compat::warn;

/// Result of a [`breaking`] call.
#[derive(Debug)]
pub enum Breaking<T, R, E> {
    /// The block fired its escape handle and is suspended at that point.
    Escaped {
        /// The value the block passed to the escape handle.
        val: T,
        /// Single-use handle that resumes the suspended block.
        resume: Resume<E>,
    },
    /// The block ran to completion without escaping.
    Completed(R),
}

struct FireState<T> {
    value: Option<T>,
    caller_waker: Option<Waker>,
}

struct ResumeState<E> {
    verdict: Option<Result<(), E>>,
    task_waker: Option<Waker>,
}

struct DoneState<R> {
    value: Option<R>,
    caller_waker: Option<Waker>,
}

/// Escape handle given to a [`breaking`] block.
///
/// Consumed by [`Escape::fire`]; a block escapes at most once.
pub struct Escape<T, E> {
    fire: Rc<RefCell<FireState<T>>>,
    resume: Rc<RefCell<ResumeState<E>>>,
}

impl<T, E> Escape<T, E> {
    /// Hands `val` out to the caller and suspends until the matching
    /// [`Resume`] is used.
    ///
    /// Resolves to `Ok(())` after [`Resume::resume`], or to the error
    /// passed to [`Resume::fail`], at this point inside the block.
    pub fn fire(self, val: T) -> EscapeWait<E> {
        let waker = {
            let mut fire = self.fire.borrow_mut();
            fire.value = Some(val);
            fire.caller_waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        EscapeWait { state: self.resume }
    }
}

/// Future returned by [`Escape::fire`]; pending until the caller resumes.
pub struct EscapeWait<E> {
    state: Rc<RefCell<ResumeState<E>>>,
}

impl<E> Future for EscapeWait<E> {
    type Output = Result<(), E>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if let Some(verdict) = state.verdict.take() {
            return Poll::Ready(verdict);
        }
        state.task_waker = Some(context.waker().clone());
        Poll::Pending
    }
}

/// Single-use handle resuming a block suspended at its escape point.
#[derive(Debug)]
pub struct Resume<E> {
    state: Rc<RefCell<ResumeState<E>>>,
    delivered: bool,
}

impl<E> std::fmt::Debug for ResumeState<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeState")
            .field("verdict_set", &self.verdict.is_some())
            .finish_non_exhaustive()
    }
}

impl<E> Resume<E> {
    /// Lets the suspended block continue to completion.
    pub fn resume(mut self) {
        self.deliver(Ok(()));
    }

    /// Surfaces `error` at the escape point inside the suspended block.
    pub fn fail(mut self, error: E) {
        self.deliver(Err(error));
    }

    fn deliver(&mut self, verdict: Result<(), E>) {
        self.delivered = true;
        let waker = {
            let mut state = self.state.borrow_mut();
            state.verdict = Some(verdict);
            state.task_waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<E> Drop for Resume<E> {
    fn drop(&mut self) {
        if !self.delivered {
            warn!("resume handle dropped unused; suspended block leaks");
        }
    }
}

/// Runs `block` as a detached background task, resolving when it either
/// fires its escape handle or completes.
///
/// The block keeps running (or stays parked at its escape point) after
/// this call resolves; drive the runtime to let it finish.
pub fn breaking<T, R, E, F, Fut>(spawner: &Spawner, block: F) -> BreakFuture<T, R, E>
where
    T: 'static,
    R: 'static,
    E: 'static,
    F: FnOnce(Escape<T, E>) -> Fut,
    Fut: Future<Output = R> + 'static,
{
    let fire = Rc::new(RefCell::new(FireState {
        value: None,
        caller_waker: None,
    }));
    let resume = Rc::new(RefCell::new(ResumeState {
        verdict: None,
        task_waker: None,
    }));
    let done = Rc::new(RefCell::new(DoneState {
        value: None,
        caller_waker: None,
    }));

    let body = block(Escape {
        fire: Rc::clone(&fire),
        resume: Rc::clone(&resume),
    });
    let task_done = Rc::clone(&done);
    spawner.spawn(async move {
        let value = body.await;
        let waker = {
            let mut done = task_done.borrow_mut();
            done.value = Some(value);
            done.caller_waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    });

    BreakFuture { fire, resume, done }
}

/// Future returned by [`breaking`].
pub struct BreakFuture<T, R, E> {
    fire: Rc<RefCell<FireState<T>>>,
    resume: Rc<RefCell<ResumeState<E>>>,
    done: Rc<RefCell<DoneState<R>>>,
}

impl<T, R, E> Future for BreakFuture<T, R, E> {
    type Output = Breaking<T, R, E>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(val) = self.fire.borrow_mut().value.take() {
            return Poll::Ready(Breaking::Escaped {
                val,
                resume: Resume {
                    state: Rc::clone(&self.resume),
                    delivered: false,
                },
            });
        }
        // Completion is checked second: a block that fires and then runs
        // to completion in the same burst still reports the escape.
        if let Some(value) = self.done.borrow_mut().value.take() {
            return Poll::Ready(Breaking::Completed(value));
        }
        self.fire.borrow_mut().caller_waker = Some(context.waker().clone());
        self.done.borrow_mut().caller_waker = Some(context.waker().clone());
        Poll::Pending
    }
}
