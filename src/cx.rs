//! The capability context type.
//!
//! `Cx` is the token a suspended operation uses to observe cancellation.
//! Every blocking primitive in this crate takes a `&Cx` and calls
//! [`Cx::checkpoint`] at its suspension points; when the enclosing scope
//! abandons the operation, the next checkpoint unwinds it cleanly.
//!
//! # Cloning
//!
//! `Cx` is cheaply clonable (it wraps an `Arc`). Clones share the same
//! underlying state, so a cancellation request is visible to all clones.
//! [`Cx::child`] creates a derived context that observes its parent's
//! cancellation in addition to its own, which is how a group cancels one
//! branch without touching its siblings.

use crate::types::CancelReason;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

#[derive(Debug)]
struct CxInner {
    cancel_requested: AtomicBool,
    reason: StdMutex<Option<CancelReason>>,
    parent: Option<Arc<CxInner>>,
}

impl CxInner {
    fn is_cancel_requested(&self) -> bool {
        if self.cancel_requested.load(Ordering::Acquire) {
            return true;
        }
        self.parent
            .as_deref()
            .is_some_and(CxInner::is_cancel_requested)
    }

    fn reason(&self) -> Option<CancelReason> {
        if self.cancel_requested.load(Ordering::Acquire) {
            return self
                .reason
                .lock()
                .expect("cancel reason lock poisoned")
                .clone();
        }
        self.parent.as_deref().and_then(CxInner::reason)
    }
}

/// Cancellation context for a cooperative computation.
#[derive(Debug, Clone)]
pub struct Cx {
    inner: Arc<CxInner>,
}

impl Cx {
    /// Creates a fresh, uncancelled context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CxInner {
                cancel_requested: AtomicBool::new(false),
                reason: StdMutex::new(None),
                parent: None,
            }),
        }
    }

    /// Creates a child context.
    ///
    /// The child observes the parent's cancellation; cancelling the child
    /// does not affect the parent or any sibling.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(CxInner {
                cancel_requested: AtomicBool::new(false),
                reason: StdMutex::new(None),
                parent: Some(Arc::clone(&self.inner)),
            }),
        }
    }

    /// Requests cancellation of this context and everything derived from it.
    ///
    /// The first reason sticks; later requests are no-ops.
    pub fn cancel(&self, reason: CancelReason) {
        {
            let mut slot = self
                .inner
                .reason
                .lock()
                .expect("cancel reason lock poisoned");
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.inner.cancel_requested.store(true, Ordering::Release);
    }

    /// Returns true if cancellation has been requested here or by an ancestor.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.is_cancel_requested()
    }

    /// Returns the effective cancellation reason, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.inner.reason()
    }

    /// Cancellation checkpoint.
    ///
    /// Blocking primitives call this on every poll; an `Err` means the
    /// operation must unwind without touching the structure it waits on.
    pub fn checkpoint(&self) -> Result<(), CancelReason> {
        if self.inner.is_cancel_requested() {
            Err(self
                .cancel_reason()
                .unwrap_or_else(|| CancelReason::user("cancelled")))
        } else {
            Ok(())
        }
    }
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelKind;

    #[test]
    fn fresh_context_passes_checkpoint() {
        let cx = Cx::new();
        assert!(!cx.is_cancel_requested());
        assert!(cx.checkpoint().is_ok());
    }

    #[test]
    fn cancel_is_sticky_and_first_reason_wins() {
        let cx = Cx::new();
        cx.cancel(CancelReason::timeout());
        cx.cancel(CancelReason::user("too late"));

        let reason = cx.checkpoint().unwrap_err();
        assert_eq!(reason.kind, CancelKind::Timeout);
    }

    #[test]
    fn child_observes_parent_cancellation() {
        let parent = Cx::new();
        let child = parent.child();

        parent.cancel(CancelReason::sibling_failed());
        assert!(child.is_cancel_requested());
        assert_eq!(
            child.checkpoint().unwrap_err().kind,
            CancelKind::FailFast
        );
    }

    #[test]
    fn cancelling_child_leaves_parent_alone() {
        let parent = Cx::new();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel(CancelReason::race_lost());
        assert!(child.is_cancel_requested());
        assert!(!parent.is_cancel_requested());
        assert!(!sibling.is_cancel_requested());
    }
}
