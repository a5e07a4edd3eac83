//! Bounded FIFO queue built from two semaphores.
//!
//! `nonfull` starts at `capacity` and meters producers; `nonempty` starts
//! at zero and meters consumers. At every quiescent point
//! `nonfull.permits() + len() == capacity` and
//! `nonempty.permits() == len()` (direct handoffs move permits out of the
//! pool early, so the equalities read through outstanding grants).
//!
//! The `sync` construction flag is forwarded to both semaphores and selects
//! their release handoff discipline, see [`Semaphore`].

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;

use crate::cx::Cx;
use crate::sync::semaphore::{AcquireError, Semaphore};
use crate::tracing_compat::trace;

/// A bounded multi-producer multi-consumer FIFO queue.
#[derive(Debug)]
pub struct Queue<T> {
    nonfull: Semaphore,
    nonempty: Semaphore,
    items: StdMutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> Queue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a zero-capacity queue can never accept
    /// an item.
    #[must_use]
    pub fn new(capacity: usize, sync: bool) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            nonfull: Semaphore::new(capacity, sync),
            nonempty: Semaphore::new(0, sync),
            items: StdMutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Returns the maximum number of items the queue can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current item count.
    ///
    /// Advisory only: under concurrent `put`/`get` the count may be stale
    /// by the time the caller looks at it.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.lock().expect("queue items lock poisoned").len()
    }

    /// Appends an item at the tail, suspending while the queue is full.
    ///
    /// Cancellation while suspended leaves the queue untouched; the item
    /// never entered it and is dropped with the future.
    pub async fn put(&self, cx: &Cx, item: T) -> Result<(), AcquireError> {
        self.nonfull.acquire(cx).await?;
        {
            let mut items = self.items.lock().expect("queue items lock poisoned");
            items.push_back(item);
            trace!(len = items.len(), "queue put");
        }
        self.nonempty.release();
        Ok(())
    }

    /// Removes and returns the head item, suspending while the queue is empty.
    pub async fn get(&self, cx: &Cx) -> Result<T, AcquireError> {
        self.nonempty.acquire(cx).await?;
        let item = {
            let mut items = self.items.lock().expect("queue items lock poisoned");
            items.pop_front().expect("nonempty permit implies an item")
        };
        self.nonfull.release();
        Ok(item)
    }
}

impl<T: Clone> Queue<T> {
    /// Returns a clone of the head item without removing it, suspending
    /// while the queue is empty.
    ///
    /// The nonempty permit is re-released rather than consumed: the item is
    /// still present, so the accounting must show it. Between the acquire
    /// and the re-release no other computation can interleave; operations
    /// only hand control back at suspension points, and this path has none.
    pub async fn peek(&self, cx: &Cx) -> Result<T, AcquireError> {
        self.nonempty.acquire(cx).await?;
        let item = {
            let items = self.items.lock().expect("queue items lock poisoned");
            items.front().cloned().expect("nonempty permit implies an item")
        };
        self.nonempty.release();
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::test_utils::{init_test_logging, test_cx};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn round_trip_preserves_value() {
        init_test_logging();
        let mut rt = Runtime::new();
        let cx = test_cx();
        let queue = Rc::new(Queue::new(4, false));

        let q = Rc::clone(&queue);
        let got = rt.block_on(async move {
            q.put(&cx, "payload").await.expect("put");
            q.get(&cx).await.expect("get")
        });
        assert_eq!(got, "payload");
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn fifo_order_end_to_end() {
        init_test_logging();
        let mut rt = Runtime::new();
        let cx = test_cx();
        let queue: Rc<Queue<u32>> = Rc::new(Queue::new(4, false));

        let q = Rc::clone(&queue);
        let (first, second) = rt.block_on(async move {
            q.put(&cx, 1).await.expect("put 1");
            q.put(&cx, 2).await.expect("put 2");
            let first = q.get(&cx).await.expect("get 1");
            let second = q.get(&cx).await.expect("get 2");
            (first, second)
        });
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn put_blocks_at_capacity_until_a_get() {
        init_test_logging();
        let mut rt = Runtime::new();
        let cx = test_cx();
        let queue: Rc<Queue<u32>> = Rc::new(Queue::new(2, false));
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let producer_q = Rc::clone(&queue);
        let producer_cx = cx.clone();
        let producer_order = Rc::clone(&order);
        rt.spawn(async move {
            for i in 0..3 {
                producer_q.put(&producer_cx, i).await.expect("put");
                producer_order.borrow_mut().push("put");
            }
        });

        let consumer_q = Rc::clone(&queue);
        let consumer_order = Rc::clone(&order);
        rt.spawn(async move {
            let item = consumer_q.get(&cx).await.expect("get");
            assert_eq!(item, 0);
            consumer_order.borrow_mut().push("get");
        });

        rt.run_until_quiescent();
        // The third put only proceeds once the consumer frees a slot.
        assert_eq!(
            order.borrow().as_slice(),
            ["put", "put", "get", "put"]
        );
        assert_eq!(queue.count(), 2);
    }

    #[test]
    fn get_blocks_on_empty_until_a_put() {
        init_test_logging();
        let mut rt = Runtime::new();
        let cx = test_cx();
        let queue: Rc<Queue<u32>> = Rc::new(Queue::new(2, false));
        let got: Rc<RefCell<Option<u32>>> = Rc::new(RefCell::new(None));

        let consumer_q = Rc::clone(&queue);
        let consumer_cx = cx.clone();
        let consumer_got = Rc::clone(&got);
        rt.spawn(async move {
            let item = consumer_q.get(&consumer_cx).await.expect("get");
            *consumer_got.borrow_mut() = Some(item);
        });
        rt.run_until_quiescent();
        assert!(got.borrow().is_none());

        let producer_q = Rc::clone(&queue);
        rt.spawn(async move {
            producer_q.put(&cx, 17).await.expect("put");
        });
        rt.run_until_quiescent();
        assert_eq!(*got.borrow(), Some(17));
    }

    #[test]
    fn peek_reads_without_consuming() {
        init_test_logging();
        let mut rt = Runtime::new();
        let cx = test_cx();
        let queue: Rc<Queue<u32>> = Rc::new(Queue::new(2, false));

        let q = Rc::clone(&queue);
        let (peeked, got) = rt.block_on(async move {
            q.put(&cx, 5).await.expect("put");
            let peeked = q.peek(&cx).await.expect("peek");
            let got = q.get(&cx).await.expect("get");
            (peeked, got)
        });
        assert_eq!(peeked, 5);
        assert_eq!(got, 5);
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn permit_accounting_holds_at_quiescence() {
        init_test_logging();
        let mut rt = Runtime::new();
        let cx = test_cx();
        let queue: Rc<Queue<u32>> = Rc::new(Queue::new(3, false));

        let q = Rc::clone(&queue);
        rt.block_on(async move {
            q.put(&cx, 1).await.expect("put");
            q.put(&cx, 2).await.expect("put");
        });
        assert_eq!(queue.count(), 2);
        assert_eq!(queue.nonempty.permits(), 2);
        assert_eq!(queue.nonfull.permits(), 1);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_is_rejected() {
        let _ = Queue::<u32>::new(0, false);
    }
}
