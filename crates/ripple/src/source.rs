#![forbid(unsafe_code)]

//! Source adapters.
//!
//! [`Source`] names the kinds of value that can become an [`Observable`];
//! [`IntoSource`] is the conversion the merge family and
//! [`Observable::from_source`] accept.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use ripple_sched::{Scheduler, default_scheduler};

use crate::error::StreamError;
use crate::observable::Observable;
use crate::promise::Promise;
use crate::subscriber::Subscriber;
use crate::subscription::Teardown;

/// A value that settles once, exposing continuation registration.
pub trait Resolvable<T> {
    /// Register continuations. Exactly one of them runs, at most once. The
    /// returned teardown withdraws both if the value has not settled yet.
    fn on_settle(
        &self,
        resolve: Box<dyn FnOnce(T)>,
        reject: Box<dyn FnOnce(StreamError)>,
    ) -> Teardown;
}

/// Something an observable can be built from.
pub enum Source<T> {
    /// Re-iterable sequence, drained eagerly on each subscription.
    Iterable(Rc<dyn Fn() -> Box<dyn Iterator<Item = T>>>),
    Observable(Observable<T>),
    /// Settles once into one value or an error.
    Resolvable(Rc<dyn Resolvable<T>>),
    /// Factory invoked once per subscription.
    Deferred(Rc<dyn Fn() -> Source<T>>),
}

impl<T> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Source::Iterable(_) => "Iterable",
            Source::Observable(_) => "Observable",
            Source::Resolvable(_) => "Resolvable",
            Source::Deferred(_) => "Deferred",
        };
        f.debug_tuple("Source").field(&kind).finish()
    }
}

impl<T: 'static> Source<T> {
    pub fn iterable<I>(iterable: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + 'static,
        I::IntoIter: 'static,
    {
        Source::Iterable(Rc::new(move || -> Box<dyn Iterator<Item = T>> {
            Box::new(iterable.clone().into_iter())
        }))
    }

    pub fn resolvable(value: impl Resolvable<T> + 'static) -> Self {
        Source::Resolvable(Rc::new(value))
    }

    pub fn deferred<S, F>(factory: F) -> Self
    where
        S: IntoSource<Item = T>,
        F: Fn() -> S + 'static,
    {
        Source::Deferred(Rc::new(move || factory().into_source()))
    }

    pub fn into_observable(self) -> Observable<T> {
        match self {
            Source::Observable(observable) => observable,
            Source::Iterable(make) => Observable::new(move |subscriber: Subscriber<T>| {
                for item in make() {
                    if subscriber.is_closed() {
                        return;
                    }
                    subscriber.next(item);
                }
                subscriber.complete();
            }),
            Source::Resolvable(value) => Observable::new(move |subscriber: Subscriber<T>| {
                let on_value = subscriber.clone();
                value.on_settle(
                    Box::new(move |item: T| {
                        on_value.next(item);
                        on_value.complete();
                    }),
                    Box::new(move |error: StreamError| subscriber.error(error)),
                )
            }),
            Source::Deferred(factory) => Observable::new(move |subscriber: Subscriber<T>| {
                factory().into_observable().produce(subscriber)
            }),
        }
    }
}

impl<T: 'static> From<Source<T>> for Observable<T> {
    fn from(source: Source<T>) -> Self {
        source.into_observable()
    }
}

/// Conversion into a [`Source`].
pub trait IntoSource: 'static {
    type Item: 'static;

    fn into_source(self) -> Source<Self::Item>;
}

impl<T: 'static> IntoSource for Source<T> {
    type Item = T;

    fn into_source(self) -> Source<T> {
        self
    }
}

impl<T: 'static> IntoSource for Observable<T> {
    type Item = T;

    fn into_source(self) -> Source<T> {
        Source::Observable(self)
    }
}

impl<T: Clone + 'static> IntoSource for Promise<T> {
    type Item = T;

    fn into_source(self) -> Source<T> {
        Source::resolvable(self)
    }
}

impl<T: Clone + 'static> IntoSource for Vec<T> {
    type Item = T;

    fn into_source(self) -> Source<T> {
        Source::iterable(self)
    }
}

impl<T: Clone + 'static, const N: usize> IntoSource for [T; N] {
    type Item = T;

    fn into_source(self) -> Source<T> {
        Source::iterable(self)
    }
}

impl<T: 'static> Observable<T> {
    /// Adapt any [`IntoSource`] value.
    pub fn from_source<S: IntoSource<Item = T>>(source: S) -> Self {
        source.into_source().into_observable()
    }

    /// Emit each value in order, then complete.
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Clone,
    {
        Source::iterable(values.into_iter().collect::<Vec<_>>()).into_observable()
    }

    /// Build a fresh source per subscription.
    pub fn defer<S, F>(factory: F) -> Self
    where
        S: IntoSource<Item = T>,
        F: Fn() -> S + 'static,
    {
        Source::deferred(factory).into_observable()
    }
}

impl Observable<i64> {
    /// Count up from `start`: `length` values, or without bound when `None`.
    ///
    /// The count stops at `i64::MAX` instead of wrapping.
    pub fn range(start: i64, length: Option<u64>) -> Self {
        let end = match length {
            None => i64::MAX,
            Some(0) => return Observable::empty(),
            Some(length) => {
                let span = i64::try_from(length - 1).unwrap_or(i64::MAX);
                start.saturating_add(span)
            }
        };
        Source::iterable(start..=end).into_observable()
    }
}

impl Observable<u64> {
    /// Emit 0, 1, 2, ... every `period` on the host's default scheduler.
    pub fn interval(period: Duration) -> Self {
        Self::interval_on(period, Rc::new(default_scheduler()))
    }

    /// Emit 0, 1, 2, ... every `period` on `scheduler`. A scheduler without
    /// periodic support fails the subscription through `error`.
    pub fn interval_on(period: Duration, scheduler: Rc<dyn Scheduler>) -> Self {
        Observable::new(move |subscriber: Subscriber<u64>| {
            let tick = subscriber.clone();
            let count = Cell::new(0u64);
            let task = Rc::new(move || {
                let n = count.get();
                count.set(n + 1);
                tick.next(n);
            });
            match scheduler.schedule_periodic(task, period, None) {
                Ok(cancel) => Teardown::from(cancel),
                Err(err) => {
                    tracing::debug!(%err, "interval cannot run on this scheduler");
                    subscriber.error(err.into());
                    Teardown::noop()
                }
            }
        })
    }
}
