#![forbid(unsafe_code)]

//! Flattening with admission control.
//!
//! `merge(n)` subscribes to at most `n` inner sources at once and queues the
//! rest in arrival order. `concat` is `merge(1)`; `merge_all` is unbounded.
//!
//! # Invariants
//!
//! 1. `active <= limit` at all times.
//! 2. Queued inners start in the order the outer source emitted them.
//! 3. Downstream `complete` fires once: after the outer source completed,
//!    with no active inner and an empty queue.
//! 4. Any inner error terminates the whole merge.
//! 5. Teardown releases every live inner and the outer subscription, and
//!    no queued inner starts afterwards.
//! 6. An inner producer that panics tears the whole merge down and
//!    unsubscribes downstream before the panic continues.
//!
//! # Design
//!
//! Live inner subscriptions sit in an arena keyed by [`InnerId`] so an inner
//! can drop its own entry on completion without searching. Inner and outer
//! executions are linked to the downstream execution, which makes
//! synchronous loops inside them stop as soon as the downstream closes.
//!
//! An inner that completes before its `subscribe` call returns (the common
//! case for synchronous sources) frees its slot while the pump loop is still
//! running. The pump is guarded against re-entry, so that completion does
//! not recurse; the running loop sees the freed slot and admits the next
//! inner.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::source::IntoSource;
use crate::subscriber::Subscriber;
use crate::subscription::{Subscription, Teardown};

/// Identity of one admitted inner execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct InnerId(u64);

struct MergeState<T> {
    queue: VecDeque<Observable<T>>,
    active: usize,
    inners: BTreeMap<InnerId, Subscription>,
    next_inner: u64,
    outer: Option<Subscription>,
    outer_done: bool,
    closed: bool,
    pumping: bool,
}

struct Merge<T> {
    limit: usize,
    /// Downstream execution id, for log correlation.
    execution: u64,
    downstream: Subscriber<T>,
    state: RefCell<MergeState<T>>,
}

/// Clears the pumping flag even when an inner subscribe unwinds.
struct PumpGuard<'a, T> {
    merge: &'a Merge<T>,
}

impl<T> Drop for PumpGuard<'_, T> {
    fn drop(&mut self) {
        self.merge.state.borrow_mut().pumping = false;
    }
}

impl<T: 'static> Merge<T> {
    fn new(limit: usize, downstream: Subscriber<T>) -> Rc<Self> {
        Rc::new(Self {
            limit,
            execution: downstream.execution(),
            downstream,
            state: RefCell::new(MergeState {
                queue: VecDeque::new(),
                active: 0,
                inners: BTreeMap::new(),
                next_inner: 0,
                outer: None,
                outer_done: false,
                closed: false,
                pumping: false,
            }),
        })
    }

    fn push(self: &Rc<Self>, inner: Observable<T>) {
        {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.queue.push_back(inner);
            tracing::trace!(
                execution = self.execution,
                queued = state.queue.len(),
                active = state.active,
                "inner source queued"
            );
        }
        self.pump();
    }

    fn outer_completed(self: &Rc<Self>) {
        self.state.borrow_mut().outer_done = true;
        self.pump();
    }

    fn hold_outer(&self, subscription: Subscription) {
        let stale = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                Some(subscription)
            } else {
                state.outer = Some(subscription);
                None
            }
        };
        if let Some(subscription) = stale {
            subscription.unsubscribe();
        }
    }

    fn admit(&self) -> Option<(InnerId, Observable<T>)> {
        let mut state = self.state.borrow_mut();
        if state.closed || state.active >= self.limit {
            return None;
        }
        let inner = state.queue.pop_front()?;
        state.active += 1;
        let id = InnerId(state.next_inner);
        state.next_inner += 1;
        tracing::trace!(
            execution = self.execution,
            inner = id.0,
            active = state.active,
            "inner source admitted"
        );
        Some((id, inner))
    }

    fn pump(self: &Rc<Self>) {
        {
            let mut state = self.state.borrow_mut();
            if state.pumping || state.closed {
                return;
            }
            state.pumping = true;
        }
        {
            let _guard = PumpGuard { merge: self };
            while !self.downstream.is_closed() {
                let Some((id, inner)) = self.admit() else {
                    break;
                };
                let driven = catch_unwind(AssertUnwindSafe(|| {
                    inner.drive(self.inner_observer(id), Some(self.downstream.link()))
                }));
                let (subscription, outcome) = match driven {
                    Ok(driven) => driven,
                    Err(payload) => {
                        tracing::trace!(
                            execution = self.execution,
                            inner = id.0,
                            "inner subscribe panicked; tearing down merge"
                        );
                        self.close();
                        self.downstream.unsubscribe();
                        resume_unwind(payload);
                    }
                };
                if !outcome.is_live() {
                    continue;
                }
                let stale = {
                    let mut state = self.state.borrow_mut();
                    if state.closed {
                        Some(subscription)
                    } else {
                        state.inners.insert(id, subscription);
                        None
                    }
                };
                if let Some(subscription) = stale {
                    subscription.unsubscribe();
                }
            }
        }

        let finished = {
            let state = self.state.borrow();
            !state.closed && state.outer_done && state.active == 0 && state.queue.is_empty()
        };
        if finished {
            tracing::trace!(execution = self.execution, "merge complete");
            self.downstream.complete();
        }
    }

    fn inner_observer(self: &Rc<Self>, id: InnerId) -> Observer<T> {
        let forward = self.downstream.clone();
        let fail = self.downstream.clone();
        let merge = Rc::clone(self);
        Observer::from_next(move |value: T| forward.next(value))
            .on_error(move |error| fail.error(error))
            .on_complete(move || merge.inner_completed(id))
    }

    fn inner_completed(self: &Rc<Self>, id: InnerId) {
        let finished = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.active = state.active.saturating_sub(1);
            state.inners.remove(&id)
        };
        drop(finished);
        tracing::trace!(execution = self.execution, inner = id.0, "inner source completed");
        self.pump();
    }

    fn close(&self) {
        let (queue, inners, outer) = {
            let mut state = self.state.borrow_mut();
            state.closed = true;
            state.outer_done = true;
            state.active = 0;
            (
                mem::take(&mut state.queue),
                mem::take(&mut state.inners),
                state.outer.take(),
            )
        };
        tracing::trace!(
            execution = self.execution,
            live = inners.len(),
            queued = queue.len(),
            "merge torn down"
        );
        drop(queue);
        for subscription in inners.into_values() {
            subscription.unsubscribe();
        }
        if let Some(outer) = outer {
            outer.unsubscribe();
        }
    }
}

impl<S: IntoSource> Observable<S> {
    /// Flatten inner sources, running at most `max_concurrent` at once.
    ///
    /// A bound of zero is treated as one.
    pub fn merge(&self, max_concurrent: usize) -> Observable<S::Item> {
        let limit = if max_concurrent == 0 {
            tracing::warn!("merge bound of 0 clamped to 1");
            1
        } else {
            max_concurrent
        };
        let outer = self.clone();
        Observable::new(move |downstream: Subscriber<S::Item>| {
            let merge = Merge::new(limit, downstream.clone());
            let on_inner = Rc::clone(&merge);
            let on_done = Rc::clone(&merge);
            let fail = downstream.clone();
            let observer = Observer::from_next(move |inner: S| {
                on_inner.push(inner.into_source().into_observable());
            })
            .on_error(move |error| fail.error(error))
            .on_complete(move || on_done.outer_completed());

            let (subscription, _) = outer.drive(observer, Some(downstream.link()));
            merge.hold_outer(subscription);
            Teardown::new(move || merge.close())
        })
    }

    /// Flatten with no concurrency bound.
    pub fn merge_all(&self) -> Observable<S::Item> {
        self.merge(usize::MAX)
    }

    /// Flatten one inner at a time, in arrival order.
    pub fn concat(&self) -> Observable<S::Item> {
        self.merge(1)
    }
}

impl<T: 'static> Observable<T> {
    pub fn flat_map<S, F>(&self, f: F) -> Observable<S::Item>
    where
        S: IntoSource,
        F: Fn(T) -> S + 'static,
    {
        self.map(f).merge_all()
    }

    pub fn concat_map<S, F>(&self, f: F) -> Observable<S::Item>
    where
        S: IntoSource,
        F: Fn(T) -> S + 'static,
    {
        self.map(f).concat()
    }
}
