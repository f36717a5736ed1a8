#![forbid(unsafe_code)]

//! Lazy push-based event sources.
//!
//! An [`Observable`] is nothing but a shared producer function. Nothing runs
//! until [`subscribe`](Observable::subscribe); every call runs the producer
//! again against fresh execution state.
//!
//! # Subscribe driver
//!
//! 1. Allocate an execution holding the observer.
//! 2. Run the producer with a [`Subscriber`] for that execution.
//! 3. If the execution closed while the producer ran (it completed, errored
//!    or was cancelled synchronously), release the returned teardown now.
//!    Otherwise the execution keeps it until termination or unsubscribe.
//! 4. Hand back a [`Subscription`].
//!
//! A panic escaping the producer tears the execution down before it
//! continues to unwind.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use crate::observer::Observer;
use crate::subscriber::{Execution, Sink, Subscriber};
use crate::subscription::{Release, SubscribeOutcome, Subscription, Teardown};

type Producer<T> = dyn Fn(Subscriber<T>) -> Teardown;

/// A lazy, repeatable stream of `T`.
pub struct Observable<T> {
    producer: Rc<Producer<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: 'static> Observable<T> {
    /// Wrap a producer. It may return `()`, a [`Teardown`], a scheduler
    /// [`Cancel`](crate::scheduler::Cancel) or a [`Subscription`].
    pub fn new<F, R>(producer: F) -> Self
    where
        F: Fn(Subscriber<T>) -> R + 'static,
        R: Into<Teardown>,
    {
        Self {
            producer: Rc::new(move |subscriber: Subscriber<T>| -> Teardown {
                producer(subscriber).into()
            }),
        }
    }

    /// Completes immediately without values.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|subscriber: Subscriber<T>| subscriber.complete())
    }

    /// Start an execution delivering to `observer`.
    pub fn subscribe(&self, observer: Observer<T>) -> Subscription {
        self.drive(observer, None).0
    }

    /// Shorthand for a subscription that only observes values.
    pub fn subscribe_next(&self, next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe(Observer::from_next(next))
    }

    /// Run the producer directly against an existing subscriber, sharing
    /// its execution.
    pub(crate) fn produce(&self, subscriber: Subscriber<T>) -> Teardown {
        (self.producer)(subscriber)
    }

    /// Subscribe driver. A `parent` makes the new execution report closed
    /// whenever the parent does.
    pub(crate) fn drive(
        &self,
        observer: Observer<T>,
        parent: Option<Rc<dyn Release>>,
    ) -> (Subscription, SubscribeOutcome) {
        let execution = Execution::new(observer, parent);
        tracing::trace!(execution = execution.id(), "subscribe");
        let subscriber = Subscriber::from_sink(Rc::clone(&execution) as Rc<dyn Sink<T>>);

        let teardown = match catch_unwind(AssertUnwindSafe(|| self.produce(subscriber))) {
            Ok(teardown) => teardown,
            Err(payload) => {
                tracing::trace!(execution = execution.id(), "producer panicked; tearing down");
                execution.abort();
                resume_unwind(payload);
            }
        };

        let outcome = execution.start(teardown);
        (Subscription::from_release(execution), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use std::cell::{Cell, RefCell};

    #[test]
    fn producer_runs_per_subscription() {
        let runs = Rc::new(Cell::new(0));
        let r = Rc::clone(&runs);
        let source = Observable::new(move |s: Subscriber<i32>| {
            r.set(r.get() + 1);
            s.next(r.get());
            s.complete();
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let seen = Rc::clone(&seen);
            source.subscribe_next(move |v| seen.borrow_mut().push(v));
        }
        assert_eq!(runs.get(), 3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn nothing_runs_before_subscribe() {
        let runs = Rc::new(Cell::new(0));
        let r = Rc::clone(&runs);
        let _source = Observable::new(move |_: Subscriber<()>| r.set(r.get() + 1));
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn synchronous_completion_releases_teardown_immediately() {
        let released = Rc::new(Cell::new(false));
        let r = Rc::clone(&released);
        let source = Observable::new(move |s: Subscriber<()>| {
            s.complete();
            let r = Rc::clone(&r);
            Teardown::new(move || r.set(true))
        });
        let sub = source.subscribe(Observer::new());
        assert!(released.get());
        assert!(sub.is_closed());
    }

    #[test]
    fn unsubscribe_from_inside_next_stops_loop() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let handle: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::new(RefCell::new(None));
        let h = Rc::clone(&handle);
        let source = Observable::new(move |s: Subscriber<i32>| {
            *h.borrow_mut() = Some(s.clone());
            for i in 0..100 {
                if s.is_closed() {
                    break;
                }
                s.next(i);
            }
        });
        let s = Rc::clone(&seen);
        let hh = Rc::clone(&handle);
        let (_, outcome) = source.drive(
            Observer::from_next(move |v: i32| {
                s.borrow_mut().push(v);
                if v == 2 {
                    if let Some(sub) = hh.borrow().as_ref() {
                        sub.unsubscribe();
                    }
                }
            }),
            None,
        );
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(outcome, SubscribeOutcome::CancelledSynchronously);
    }

    #[test]
    fn error_is_terminal() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (e, c) = (Rc::clone(&log), Rc::clone(&log));
        let source = Observable::new(|s: Subscriber<i32>| {
            s.error(StreamError::msg("bad"));
            s.complete();
            s.error(StreamError::msg("worse"));
        });
        source.subscribe(
            Observer::new()
                .on_error(move |err| e.borrow_mut().push(err.to_string()))
                .on_complete(move || c.borrow_mut().push("complete".into())),
        );
        assert_eq!(*log.borrow(), vec!["bad".to_string()]);
    }

    #[test]
    fn producer_panic_tears_down_then_unwinds() {
        let closed = Rc::new(RefCell::new(None::<Subscriber<i32>>));
        let c = Rc::clone(&closed);
        let source = Observable::new(move |s: Subscriber<i32>| -> Teardown {
            *c.borrow_mut() = Some(s.clone());
            panic!("producer boom");
        });
        let result = catch_unwind(AssertUnwindSafe(|| source.subscribe(Observer::new())));
        assert!(result.is_err());
        assert!(closed.borrow().as_ref().is_some_and(Subscriber::is_closed));
    }

    #[test]
    fn empty_completes() {
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let sub = Observable::<u8>::empty().subscribe(Observer::new().on_complete(move || d.set(true)));
        assert!(done.get());
        assert!(sub.is_closed());
    }
}
