//! Binary-tree dispatch for `waitfor_all` / `waitfor_first`.
//!
//! The task list is split recursively into two halves until a half holds a
//! single task, which runs as a [`Leaf`]. Inner nodes are two-way join or
//! race futures, so nesting depth stays logarithmic in the fan-out width.
//!
//! A panicking task is contained at its leaf: the unwind is caught and
//! surfaces as [`Outcome::Panicked`], the worst severity, which the tree
//! aggregates like any other non-`Ok` outcome.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::combinator::join::{JoinTwo, NodeFuture};
use crate::combinator::race::{RaceNodeFuture, RaceTwo};
use crate::combinator::{TaskFn, TaskFuture};
use crate::tracing_compat::debug;
use crate::types::{Outcome, PanicPayload};

/// A single task at the bottom of the dispatch tree.
///
/// Panics in the task factory and in the body's polls are both caught here
/// and reported as `Panicked` outcomes.
struct Leaf<T, E> {
    factory: Option<TaskFn<T, E>>,
    body: Option<TaskFuture<T, E>>,
}

impl<T, E> Leaf<T, E> {
    fn new(factory: TaskFn<T, E>) -> Self {
        Self {
            factory: Some(factory),
            body: None,
        }
    }
}

impl<T, E> Future for Leaf<T, E> {
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(factory) = this.factory.take() {
            match catch_unwind(AssertUnwindSafe(factory)) {
                Ok(body) => this.body = Some(body),
                Err(payload) => {
                    return Poll::Ready(Outcome::Panicked(PanicPayload::from_any(
                        payload.as_ref(),
                    )));
                }
            }
        }

        let body = this.body.as_mut().expect("leaf body constructed");
        match catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(context))) {
            Ok(Poll::Ready(Ok(value))) => Poll::Ready(Outcome::Ok(value)),
            Ok(Poll::Ready(Err(error))) => Poll::Ready(Outcome::Err(error)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => {
                // The body is poisoned by the unwind; never poll it again.
                this.body = None;
                Poll::Ready(Outcome::Panicked(PanicPayload::from_any(payload.as_ref())))
            }
        }
    }
}

fn all_node<T: 'static, E: 'static>(mut tasks: Vec<TaskFn<T, E>>) -> NodeFuture<T, E> {
    debug_assert!(!tasks.is_empty());
    if tasks.len() == 1 {
        let task = tasks.pop().expect("single task present");
        return Box::pin(async move { Leaf::new(task).await.map(|value| vec![value]) });
    }
    let right = tasks.split_off(tasks.len() / 2);
    Box::pin(JoinTwo::new(all_node(tasks), all_node(right)))
}

fn first_node<T: 'static, E: 'static>(mut tasks: Vec<TaskFn<T, E>>) -> RaceNodeFuture<T, E> {
    debug_assert!(!tasks.is_empty());
    if tasks.len() == 1 {
        let task = tasks.pop().expect("single task present");
        return Box::pin(Leaf::new(task));
    }
    let right = tasks.split_off(tasks.len() / 2);
    Box::pin(RaceTwo::new(first_node(tasks), first_node(right)))
}

/// Runs every task concurrently and resolves once all have finished.
///
/// Values are collected in input order. The first non-`Ok` outcome wins
/// and cancels every in-flight sibling; an empty list resolves immediately
/// with no values.
pub async fn waitfor_all<T: 'static, E: 'static>(tasks: Vec<TaskFn<T, E>>) -> Outcome<Vec<T>, E> {
    if tasks.is_empty() {
        return Outcome::Ok(Vec::new());
    }
    debug!(tasks = tasks.len(), "waitfor_all dispatch");
    all_node(tasks).await
}

/// Runs `f` once per element of `args`, concurrently, resolving once all
/// invocations have finished.
///
/// Each invocation receives the element, its index, and a shared handle to
/// the whole argument list.
pub async fn waitfor_all_each<A, T, E, F>(f: F, args: Vec<A>) -> Outcome<Vec<T>, E>
where
    A: Clone + 'static,
    T: 'static,
    E: 'static,
    F: Fn(A, usize, Rc<[A]>) -> TaskFuture<T, E> + 'static,
{
    let shared: Rc<[A]> = args.into();
    let f = Rc::new(f);
    let tasks = shared
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, element)| {
            let f = Rc::clone(&f);
            let shared = Rc::clone(&shared);
            Box::new(move || f(element, index, shared)) as TaskFn<T, E>
        })
        .collect();
    waitfor_all(tasks).await
}

/// Runs every task concurrently and resolves with the first to finish,
/// value or failure alike, cancelling the rest.
///
/// # Panics
///
/// Panics synchronously, before any task starts, if `tasks` is empty; a
/// race over nothing can never resolve.
pub fn waitfor_first<T: 'static, E: 'static>(
    tasks: Vec<TaskFn<T, E>>,
) -> impl Future<Output = Outcome<T, E>> {
    assert!(!tasks.is_empty(), "waitfor_first requires at least one task");
    debug!(tasks = tasks.len(), "waitfor_first dispatch");
    first_node(tasks)
}

/// Runs `f` once per element of `args`, concurrently, resolving with the
/// first invocation to finish and cancelling the rest.
///
/// # Panics
///
/// Panics synchronously if `args` is empty.
pub fn waitfor_first_each<A, T, E, F>(f: F, args: Vec<A>) -> impl Future<Output = Outcome<T, E>>
where
    A: Clone + 'static,
    T: 'static,
    E: 'static,
    F: Fn(A, usize, Rc<[A]>) -> TaskFuture<T, E> + 'static,
{
    assert!(!args.is_empty(), "waitfor_first_each requires at least one argument");
    let shared: Rc<[A]> = args.into();
    let f = Rc::new(f);
    let tasks = shared
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, element)| {
            let f = Rc::clone(&f);
            let shared = Rc::clone(&shared);
            Box::new(move || f(element, index, shared)) as TaskFn<T, E>
        })
        .collect();
    waitfor_first(tasks)
}
