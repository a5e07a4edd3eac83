//! Synchronization primitives.
//!
//! Everything here is cancel-safe: dropping a pending acquire or wait
//! future removes the waiter with no side effect, and a waiter is either
//! fully resumed or fully cancelled, never both.

pub mod condition;
pub mod queue;
pub mod semaphore;
pub mod waitable;

pub use condition::{Condition, ConditionWait};
pub use queue::Queue;
pub use semaphore::{AcquireError, AcquireFuture, Semaphore, TryAcquireError};
pub use waitable::{WaitError, WaitFuture, Waitable};
