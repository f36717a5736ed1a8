#![forbid(unsafe_code)]

//! Per-value operators built on interception.
//!
//! Intercepting substitutes the `next` handler of an execution while
//! forwarding `error`, `complete`, cancellation and the closed flag to the
//! downstream subscriber unchanged. The upstream producer runs directly
//! against the intercepted subscriber, so an operator chain shares one
//! execution and one teardown.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::subscriber::{Sink, Subscriber};

struct Intercept<T, U> {
    downstream: Subscriber<U>,
    next: Box<dyn Fn(T)>,
}

impl<T, U: 'static> Sink<T> for Intercept<T, U> {
    fn next(&self, value: T) {
        if self.downstream.is_closed() {
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (self.next)(value))) {
            self.downstream.unsubscribe();
            resume_unwind(payload);
        }
    }

    fn error(&self, error: StreamError) {
        self.downstream.error(error);
    }

    fn complete(&self) {
        self.downstream.complete();
    }

    fn is_closed(&self) -> bool {
        self.downstream.is_closed()
    }

    fn unsubscribe(&self) {
        self.downstream.unsubscribe();
    }

    fn execution(&self) -> u64 {
        self.downstream.execution()
    }
}

impl<T: 'static> Observable<T> {
    /// Build an observable whose `next` handler is produced per execution by
    /// `make_next` from the downstream subscriber.
    pub(crate) fn intercept<U, F>(&self, make_next: F) -> Observable<U>
    where
        U: 'static,
        F: Fn(&Subscriber<U>) -> Box<dyn Fn(T)> + 'static,
    {
        let source = self.clone();
        Observable::new(move |downstream: Subscriber<U>| {
            let next = make_next(&downstream);
            let upstream = Subscriber::from_sink(Rc::new(Intercept { downstream, next }));
            source.produce(upstream)
        })
    }

    /// Replace each value with `f(value)`.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Observable<U> {
        let f = Rc::new(f);
        self.intercept(move |downstream| {
            let f = Rc::clone(&f);
            let downstream = downstream.clone();
            Box::new(move |value: T| downstream.next(f(value)))
        })
    }

    /// Forward only the values for which `predicate` holds.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Observable<T> {
        let predicate = Rc::new(predicate);
        self.intercept(move |downstream| {
            let predicate = Rc::clone(&predicate);
            let downstream = downstream.clone();
            Box::new(move |value: T| {
                if predicate(&value) {
                    downstream.next(value);
                }
            })
        })
    }

    /// Forward at most `count` values, completing right after the last one.
    /// A non-positive count yields an empty stream.
    pub fn take(&self, count: isize) -> Observable<T> {
        if count <= 0 {
            return Observable::empty();
        }
        self.intercept(move |downstream| {
            let remaining = Cell::new(count);
            let downstream = downstream.clone();
            Box::new(move |value: T| {
                let left = remaining.get();
                if left <= 0 {
                    return;
                }
                remaining.set(left - 1);
                downstream.next(value);
                if left == 1 {
                    downstream.complete();
                }
            })
        })
    }

    /// Suppress the first `count` values. A negative count passes every
    /// value through.
    pub fn drop(&self, count: isize) -> Observable<T> {
        if count <= 0 {
            return self.clone();
        }
        self.intercept(move |downstream| {
            let skipped = Cell::new(0isize);
            let downstream = downstream.clone();
            Box::new(move |value: T| {
                if skipped.get() < count {
                    skipped.set(skipped.get() + 1);
                    return;
                }
                downstream.next(value);
            })
        })
    }
}
