//! End-to-end tests for continuation capture.
//!
//! The canonical use: a block acquires a resource, hands a derived value
//! out to the caller, and keeps its release scope open until the caller
//! decides the resource can go.

use std::cell::RefCell;
use std::rc::Rc;

use coopsync::breaking::{breaking, Breaking};
use coopsync::sync::Semaphore;
use coopsync::test_utils::{init_test_logging, test_cx};
use coopsync::{test_complete, test_phase, Runtime};

#[test]
fn deferred_teardown_holds_the_resource_until_resume() {
    init_test_logging();
    test_phase!("deferred_teardown_holds_the_resource_until_resume");
    let mut rt = Runtime::new();
    let spawner = rt.spawner();
    let pool = Rc::new(Semaphore::new(1, false));

    let block_pool = Rc::clone(&pool);
    let block_cx = test_cx();
    let breaking_result = rt.block_on(async move {
        breaking::<u32, (), (), _, _>(&spawner, |escape| async move {
            block_pool
                .synchronize(&block_cx, || async {
                    // The caller gets the handle while the permit is held.
                    let _ = escape.fire(77).await;
                })
                .await
                .expect("acquire");
        })
        .await
    });

    let Breaking::Escaped { val, resume } = breaking_result else {
        panic!("block escaped");
    };
    assert_eq!(val, 77);
    // The critical section is still open: the permit is not back.
    assert_eq!(pool.permits(), 0);
    assert_eq!(rt.live_tasks(), 1);

    resume.resume();
    rt.run_until_quiescent();
    assert_eq!(pool.permits(), 1);
    assert_eq!(rt.live_tasks(), 0);
    test_complete!("deferred_teardown_holds_the_resource_until_resume");
}

#[test]
fn fail_raises_inside_the_block_and_teardown_still_runs() {
    init_test_logging();
    test_phase!("fail_raises_inside_the_block_and_teardown_still_runs");
    let mut rt = Runtime::new();
    let spawner = rt.spawner();
    let pool = Rc::new(Semaphore::new(1, false));
    let observed: Rc<RefCell<Option<&'static str>>> = Rc::new(RefCell::new(None));

    let block_pool = Rc::clone(&pool);
    let block_cx = test_cx();
    let block_observed = Rc::clone(&observed);
    let breaking_result = rt.block_on(async move {
        breaking::<u32, (), &'static str, _, _>(&spawner, |escape| async move {
            block_pool
                .synchronize(&block_cx, || async {
                    if let Err(error) = escape.fire(1).await {
                        *block_observed.borrow_mut() = Some(error);
                    }
                })
                .await
                .expect("acquire");
        })
        .await
    });

    let Breaking::Escaped { resume, .. } = breaking_result else {
        panic!("block escaped");
    };
    resume.fail("connection revoked");
    rt.run_until_quiescent();

    assert_eq!(*observed.borrow(), Some("connection revoked"));
    // The error surfaced inside the critical section, which closed anyway.
    assert_eq!(pool.permits(), 1);
    assert_eq!(rt.live_tasks(), 0);
    test_complete!("fail_raises_inside_the_block_and_teardown_still_runs");
}

#[test]
fn non_escaping_block_is_a_plain_call() {
    init_test_logging();
    test_phase!("non_escaping_block_is_a_plain_call");
    let mut rt = Runtime::new();
    let spawner = rt.spawner();

    let breaking_result = rt.block_on(async move {
        breaking::<u32, &'static str, (), _, _>(&spawner, |_escape| async move {
            "ran straight through"
        })
        .await
    });
    let Breaking::Completed(value) = breaking_result else {
        panic!("block completed without escaping");
    };
    assert_eq!(value, "ran straight through");
    assert_eq!(rt.live_tasks(), 0);
    test_complete!("non_escaping_block_is_a_plain_call");
}

#[test]
fn unresumed_handle_leaves_a_visible_leak() {
    init_test_logging();
    test_phase!("unresumed_handle_leaves_a_visible_leak");
    let mut rt = Runtime::new();
    let spawner = rt.spawner();
    let pool = Rc::new(Semaphore::new(1, false));

    let block_pool = Rc::clone(&pool);
    let block_cx = test_cx();
    let breaking_result = rt.block_on(async move {
        breaking::<u32, (), (), _, _>(&spawner, |escape| async move {
            block_pool
                .synchronize(&block_cx, || async {
                    let _ = escape.fire(1).await;
                })
                .await
                .expect("acquire");
        })
        .await
    });

    let Breaking::Escaped { resume, .. } = breaking_result else {
        panic!("block escaped");
    };
    drop(resume);
    rt.run_until_quiescent();

    // The block stays parked inside its critical section: the task and
    // the permit both leak, and the task count shows it.
    assert_eq!(rt.live_tasks(), 1);
    assert_eq!(pool.permits(), 0);
    test_complete!("unresumed_handle_leaves_a_visible_leak");
}
