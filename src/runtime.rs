//! Single-threaded cooperative runtime.
//!
//! This is the scheduling substrate the synchronization primitives run on:
//! a deterministic, waker-driven executor on one thread. Concurrent
//! computations interleave only at suspension points (pending polls), so an
//! operation's non-blocking fast path is atomic with respect to every other
//! computation.
//!
//! - [`Runtime::spawn`] / [`Spawner::spawn`]: detached background tasks
//!   whose lifetime is bounded by the runtime (the enclosing blocking scope)
//! - [`Runtime::block_on`]: drive a root future to completion, running
//!   spawned tasks as they become ready
//! - [`Runtime::run_until_quiescent`]: run until no task is runnable
//! - [`Runtime::live_tasks`]: count of unfinished tasks, parked ones
//!   included — the leak-detection hook for unresumed continuations
//!
//! Tasks are stored in a generational arena; wakers carry the arena index,
//! so a wake aimed at a finished task finds a stale slot and is ignored.

use crate::util::{Arena, ArenaIndex};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll, Wake, Waker};

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Identifier of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(ArenaIndex);

impl TaskId {
    /// Returns the arena slot backing this task.
    #[must_use]
    pub const fn index(self) -> ArenaIndex {
        self.0
    }
}

/// The cooperative runtime.
#[derive(Default)]
pub struct Runtime {
    tasks: Arena<LocalFuture>,
    ready: Arc<StdMutex<VecDeque<ArenaIndex>>>,
    inbox: Rc<RefCell<Vec<LocalFuture>>>,
    steps: u64,
}

struct TaskWaker {
    index: ArenaIndex,
    ready: Arc<StdMutex<VecDeque<ArenaIndex>>>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.ready
            .lock()
            .expect("ready queue lock poisoned")
            .push_back(self.index);
    }
}

impl Runtime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that can spawn detached tasks from inside a task.
    #[must_use]
    pub fn spawner(&self) -> Spawner {
        Spawner {
            inbox: Rc::clone(&self.inbox),
        }
    }

    /// Spawns a detached task.
    pub fn spawn<F>(&mut self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let index = self.tasks.insert(Box::pin(future));
        self.ready
            .lock()
            .expect("ready queue lock poisoned")
            .push_back(index);
        TaskId(index)
    }

    /// Returns the number of unfinished tasks, parked ones included.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Returns the number of polls executed so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs until no task is runnable. Returns the number of polls executed.
    ///
    /// Parked tasks (suspended with no pending wake) do not keep the
    /// runtime spinning; they stay in the arena and count as live.
    pub fn run_until_quiescent(&mut self) -> u64 {
        let start = self.steps;
        while self.step() {}
        self.steps - start
    }

    /// Drives `future` to completion, running spawned tasks alongside it.
    ///
    /// # Panics
    ///
    /// Panics if the task graph goes quiescent before the root future
    /// completes (a cooperative deadlock).
    pub fn block_on<F>(&mut self, future: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let output = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&output);
        self.spawn(async move {
            *slot.borrow_mut() = Some(future.await);
        });
        self.run_until_quiescent();
        // Take the value in its own statement so the RefMut drops before
        // `output` does.
        let result = output.borrow_mut().take();
        result.expect("cooperative deadlock: root future stalled with no runnable tasks")
    }

    /// Polls one ready task. Returns false when nothing is runnable.
    fn step(&mut self) -> bool {
        self.drain_inbox();

        let popped = self
            .ready
            .lock()
            .expect("ready queue lock poisoned")
            .pop_front();
        let Some(index) = popped else {
            // The inbox may have been filled by a task polled this step.
            return !self.inbox.borrow().is_empty();
        };

        // A stale index (finished task) is skipped, not an error.
        let Some(slot) = self.tasks.get_mut(index) else {
            return true;
        };
        let mut future = std::mem::replace(slot, Box::pin(std::future::pending()));

        let waker = Waker::from(Arc::new(TaskWaker {
            index,
            ready: Arc::clone(&self.ready),
        }));
        let mut task_cx = Context::from_waker(&waker);

        self.steps += 1;
        match future.as_mut().poll(&mut task_cx) {
            Poll::Ready(()) => {
                self.tasks.remove(index);
            }
            Poll::Pending => {
                if let Some(slot) = self.tasks.get_mut(index) {
                    *slot = future;
                }
            }
        }
        true
    }

    fn drain_inbox(&mut self) {
        let pending: Vec<LocalFuture> = self.inbox.borrow_mut().drain(..).collect();
        for future in pending {
            let index = self.tasks.insert(future);
            self.ready
                .lock()
                .expect("ready queue lock poisoned")
                .push_back(index);
        }
    }
}

/// Handle for spawning detached tasks from inside a running task.
#[derive(Clone)]
pub struct Spawner {
    inbox: Rc<RefCell<Vec<LocalFuture>>>,
}

impl Spawner {
    /// Queues a detached task; it starts running on the next scheduler step.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.inbox.borrow_mut().push(Box::pin(future));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn block_on_returns_root_value() {
        let mut rt = Runtime::new();
        let value = rt.block_on(async { 41 + 1 });
        assert_eq!(value, 42);
        assert_eq!(rt.live_tasks(), 0);
    }

    #[test]
    fn spawned_tasks_run_to_completion() {
        let mut rt = Runtime::new();
        let counter = Rc::new(Cell::new(0));
        let mut ids = Vec::new();
        for _ in 0..3 {
            let counter = Rc::clone(&counter);
            ids.push(rt.spawn(async move {
                counter.set(counter.get() + 1);
            }));
        }
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0].index(), ids[1].index());
        rt.run_until_quiescent();
        assert_eq!(counter.get(), 3);
        assert_eq!(rt.live_tasks(), 0);
    }

    #[test]
    fn spawner_injects_tasks_from_inside_a_task() {
        let mut rt = Runtime::new();
        let spawner = rt.spawner();
        let flag = Rc::new(Cell::new(false));
        let inner_flag = Rc::clone(&flag);
        rt.block_on(async move {
            spawner.spawn(async move {
                inner_flag.set(true);
            });
        });
        // block_on runs until quiescent, so the injected task finished too.
        assert!(flag.get());
    }

    #[test]
    fn parked_task_counts_as_live() {
        let mut rt = Runtime::new();
        rt.spawn(std::future::pending());
        rt.run_until_quiescent();
        assert_eq!(rt.live_tasks(), 1);
    }

    #[test]
    #[should_panic(expected = "cooperative deadlock")]
    fn block_on_detects_stalled_root() {
        let mut rt = Runtime::new();
        let _: () = rt.block_on(std::future::pending());
    }
}
