//! Test utilities.
//!
//! Shared helpers for unit and integration tests:
//! - logging initialization routed through [`tracing_compat`](crate::tracing_compat)
//! - phase/completion macros for readable test output
//! - manual-polling helpers for exercising futures without a runtime
//! - outcome assertion macros
//!
//! # Example
//! ```
//! use coopsync::test_utils::{init_test_logging, run_test};
//!
//! init_test_logging();
//! run_test(|| async {
//!     // async test code
//! });
//! ```

use crate::cx::Cx;
use crate::runtime::Runtime;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once. Compiles to a no-op
/// without the `tracing-integration` feature.
pub fn init_test_logging() {
    #[cfg(feature = "tracing-integration")]
    {
        use std::sync::Once;
        static INIT_LOGGING: Once = Once::new();
        INIT_LOGGING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_test_writer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_ansi(false)
                .try_init();
        });
    }
}

/// Create a fresh cancellation context for a test.
#[must_use]
pub fn test_cx() -> Cx {
    Cx::new()
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// Returns a waker that discards every wake.
#[must_use]
pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWake))
}

/// Polls `future` once against a throwaway waker.
///
/// For state-machine tests that need to observe intermediate suspension
/// states a runtime would hide.
pub fn poll_once<F>(future: &mut F) -> Poll<F::Output>
where
    F: Future + Unpin,
{
    let waker = noop_waker();
    let mut context = Context::from_waker(&waker);
    Pin::new(future).poll(&mut context)
}

/// Run async test code on a fresh cooperative runtime.
pub fn run_test<F, Fut>(f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()> + 'static,
{
    init_test_logging();
    let mut runtime = Runtime::new();
    runtime.block_on(f());
}

/// Run async test code with a test [`Cx`].
pub fn run_test_with_cx<F, Fut>(f: F)
where
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = ()> + 'static,
{
    init_test_logging();
    let mut runtime = Runtime::new();
    runtime.block_on(f(test_cx()));
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::tracing_compat::info!(phase = %$name, "========================================");
        $crate::tracing_compat::info!(phase = %$name, "TEST PHASE: {}", $name);
        $crate::tracing_compat::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::tracing_compat::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::tracing_compat::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        $crate::tracing_compat::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that an outcome is Ok with a specific value.
#[macro_export]
macro_rules! assert_outcome_ok {
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            $crate::types::Outcome::Ok(v) => assert_eq!(v, $expected),
            other => unreachable!("expected Outcome::Ok({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an outcome is Err.
#[macro_export]
macro_rules! assert_outcome_err {
    ($outcome:expr) => {
        match $outcome {
            $crate::types::Outcome::Err(_) => {}
            other => unreachable!("expected Outcome::Err, got {:?}", other),
        }
    };
}

/// Assert that an outcome is Cancelled.
#[macro_export]
macro_rules! assert_outcome_cancelled {
    ($outcome:expr) => {
        match $outcome {
            $crate::types::Outcome::Cancelled(_) => {}
            other => unreachable!("expected Outcome::Cancelled, got {:?}", other),
        }
    };
}

/// Assert that an outcome is Panicked.
#[macro_export]
macro_rules! assert_outcome_panicked {
    ($outcome:expr) => {
        match $outcome {
            $crate::types::Outcome::Panicked(_) => {}
            other => unreachable!("expected Outcome::Panicked, got {:?}", other),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_once_sees_pending_then_ready() {
        let mut pending = std::future::pending::<()>();
        assert!(poll_once(&mut pending).is_pending());

        let mut ready = std::future::ready(5);
        assert_eq!(poll_once(&mut ready), Poll::Ready(5));
    }

    #[test]
    fn run_test_drives_async_code() {
        run_test(|| async {
            let value = std::future::ready(1).await;
            assert_eq!(value, 1);
        });
    }
}
