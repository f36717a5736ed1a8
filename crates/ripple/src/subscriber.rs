#![forbid(unsafe_code)]

//! Producer-side handles and per-execution state.
//!
//! Every `subscribe` call allocates one [`Execution`]: it owns the observer,
//! the teardown returned by the producer, and the closed flag. Producers see
//! it through a [`Subscriber`]; consumers see it through a
//! [`Subscription`](crate::Subscription).
//!
//! # Invariants
//!
//! 1. After `error` or `complete` is delivered nothing else is delivered.
//! 2. Closing drops the observer, so a call already in flight elsewhere on
//!    the stack becomes inert for everything that follows.
//! 3. The teardown is released exactly once, and never before the producer
//!    has returned it.
//! 4. No `RefCell` borrow is held while user code runs.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `next` handler panics | user bug | unsubscribe, then resume unwinding |
//! | `error`/`complete` handler panics | user bug | release teardown, then resume unwinding |
//! | Teardown panics | user bug | logged at `warn`, suppressed |
//! | Parent execution closed | operator downstream cancelled | reports closed, drops `next` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StreamError;
use crate::observer::Observer;
use crate::subscription::{Release, SubscribeOutcome, Teardown};

static NEXT_EXECUTION: AtomicU64 = AtomicU64::new(1);

/// Destination of producer signals.
pub(crate) trait Sink<T> {
    fn next(&self, value: T);
    fn error(&self, error: StreamError);
    fn complete(&self);
    fn is_closed(&self) -> bool;
    fn unsubscribe(&self);
    /// Id of the execution the signals end up in.
    fn execution(&self) -> u64;
}

/// Producer-side handle to one execution.
///
/// Producers that emit in a synchronous loop must poll
/// [`is_closed`](Subscriber::is_closed): cancellation from inside a callback
/// cannot interrupt the loop any other way.
pub struct Subscriber<T> {
    sink: Rc<dyn Sink<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Rc::clone(&self.sink),
        }
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("closed", &self.sink.is_closed())
            .finish()
    }
}

impl<T: 'static> Subscriber<T> {
    pub(crate) fn from_sink(sink: Rc<dyn Sink<T>>) -> Self {
        Self { sink }
    }

    /// Emit a value. Ignored once the execution is closed.
    pub fn next(&self, value: T) {
        self.sink.next(value);
    }

    /// Terminate with an error. Ignored once the execution is closed.
    pub fn error(&self, error: StreamError) {
        self.sink.error(error);
    }

    /// Terminate successfully. Ignored once the execution is closed.
    pub fn complete(&self) {
        self.sink.complete();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    /// Cancel the execution from the producer side.
    pub fn unsubscribe(&self) {
        self.sink.unsubscribe();
    }

    pub(crate) fn execution(&self) -> u64 {
        self.sink.execution()
    }

    /// Parent handle for child executions that must close with this one.
    pub(crate) fn link(&self) -> Rc<dyn Release> {
        Rc::new(SubscriberLink {
            subscriber: self.clone(),
        })
    }
}

struct SubscriberLink<T> {
    subscriber: Subscriber<T>,
}

impl<T: 'static> Release for SubscriberLink<T> {
    fn is_closed(&self) -> bool {
        self.subscriber.is_closed()
    }

    fn unsubscribe(&self) {
        self.subscriber.unsubscribe();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Completed,
    Errored,
    Cancelled,
}

/// State of one subscription.
pub(crate) struct Execution<T> {
    id: u64,
    observer: RefCell<Option<Observer<T>>>,
    teardown: RefCell<Option<Teardown>>,
    started: Cell<bool>,
    closed: Cell<bool>,
    ending: Cell<Option<Ending>>,
    parent: Option<Rc<dyn Release>>,
}

impl<T: 'static> Execution<T> {
    pub(crate) fn new(observer: Observer<T>, parent: Option<Rc<dyn Release>>) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_EXECUTION.fetch_add(1, Ordering::Relaxed),
            observer: RefCell::new(Some(observer)),
            teardown: RefCell::new(None),
            started: Cell::new(false),
            closed: Cell::new(false),
            ending: Cell::new(None),
            parent,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Record the producer's teardown. If the execution already closed, the
    /// teardown is released right away.
    pub(crate) fn start(&self, teardown: Teardown) -> SubscribeOutcome {
        self.started.set(true);
        if !self.closed.get() && self.parent_closed() {
            drop(self.close(Ending::Cancelled));
        }
        if !self.closed.get() {
            *self.teardown.borrow_mut() = Some(teardown);
            return SubscribeOutcome::Live;
        }
        teardown.release();
        let outcome = match self.ending.get() {
            Some(Ending::Cancelled) | None => SubscribeOutcome::CancelledSynchronously,
            Some(Ending::Completed | Ending::Errored) => SubscribeOutcome::CompletedSynchronously,
        };
        tracing::trace!(execution = self.id, ?outcome, "producer returned after close");
        outcome
    }

    /// The producer panicked before returning a teardown.
    pub(crate) fn abort(&self) {
        self.started.set(true);
        Release::unsubscribe(self);
    }

    fn parent_closed(&self) -> bool {
        self.parent.as_ref().is_some_and(|parent| parent.is_closed())
    }

    fn close(&self, ending: Ending) -> Option<Observer<T>> {
        if self.closed.get() {
            return None;
        }
        self.closed.set(true);
        self.ending.set(Some(ending));
        self.observer.borrow_mut().take()
    }

    fn release_teardown(&self) {
        if !self.started.get() {
            return;
        }
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown.release();
        }
    }

    fn terminate(&self, ending: Ending, deliver: impl FnOnce(&Observer<T>)) {
        let Some(observer) = self.close(ending) else {
            return;
        };
        tracing::trace!(execution = self.id, ?ending, "execution terminated");
        let result = catch_unwind(AssertUnwindSafe(|| deliver(&observer)));
        drop(observer);
        self.release_teardown();
        if let Err(payload) = result {
            resume_unwind(payload);
        }
    }
}

impl<T: 'static> Sink<T> for Execution<T> {
    fn next(&self, value: T) {
        if Release::is_closed(self) {
            return;
        }
        let next = self
            .observer
            .borrow()
            .as_ref()
            .map(|observer| Rc::clone(&observer.next));
        let Some(next) = next else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| next(value))) {
            tracing::trace!(execution = self.id, "next handler panicked; tearing down");
            Release::unsubscribe(self);
            resume_unwind(payload);
        }
    }

    fn error(&self, error: StreamError) {
        self.terminate(Ending::Errored, |observer| (observer.error)(error));
    }

    fn complete(&self) {
        self.terminate(Ending::Completed, |observer| (observer.complete)());
    }

    fn is_closed(&self) -> bool {
        Release::is_closed(self)
    }

    fn unsubscribe(&self) {
        Release::unsubscribe(self);
    }

    fn execution(&self) -> u64 {
        self.id
    }
}

impl<T: 'static> Release for Execution<T> {
    fn is_closed(&self) -> bool {
        self.closed.get() || self.parent_closed()
    }

    fn unsubscribe(&self) {
        if let Some(observer) = self.close(Ending::Cancelled) {
            drop(observer);
            tracing::trace!(execution = self.id, "execution unsubscribed");
        }
        self.release_teardown();
    }
}
