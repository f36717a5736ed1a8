#![forbid(unsafe_code)]

//! Consumer-side callbacks.

use std::fmt;
use std::rc::Rc;

use crate::error::StreamError;

/// The `next` / `error` / `complete` callback triple handed to `subscribe`.
///
/// Callbacks are `Fn` so they can be invoked re-entrantly (a `next` handler
/// may trigger more emissions on the same stream). Keep mutable state in a
/// `Cell` or `RefCell`.
pub struct Observer<T> {
    pub(crate) next: Rc<dyn Fn(T)>,
    pub(crate) error: Rc<dyn Fn(StreamError)>,
    pub(crate) complete: Rc<dyn Fn()>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            next: Rc::clone(&self.next),
            error: Rc::clone(&self.error),
            complete: Rc::clone(&self.complete),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

impl<T: 'static> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Observer<T> {
    /// An observer that ignores values and completion. Unhandled errors are
    /// logged at debug level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: Rc::new(|_: T| {}),
            error: Rc::new(|err: StreamError| tracing::debug!(%err, "stream error without error handler")),
            complete: Rc::new(|| {}),
        }
    }

    /// An observer with only a `next` callback.
    pub fn from_next(next: impl Fn(T) + 'static) -> Self {
        Self::new().on_next(next)
    }

    #[must_use]
    pub fn on_next(mut self, next: impl Fn(T) + 'static) -> Self {
        self.next = Rc::new(next);
        self
    }

    #[must_use]
    pub fn on_error(mut self, error: impl Fn(StreamError) + 'static) -> Self {
        self.error = Rc::new(error);
        self
    }

    #[must_use]
    pub fn on_complete(mut self, complete: impl Fn() + 'static) -> Self {
        self.complete = Rc::new(complete);
        self
    }
}
