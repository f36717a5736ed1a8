#![forbid(unsafe_code)]

//! Stream errors.
//!
//! Errors signaled by a producer travel as [`StreamError`]: an opaque,
//! cheaply clonable value that either carries a message or wraps any
//! `std::error::Error`. Panics raised by user callbacks are not converted
//! into stream errors; they unwind to the caller after teardown.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use ripple_sched::SchedulerError;

/// Error delivered through an observer's `error` callback.
#[derive(Clone)]
pub struct StreamError {
    inner: Rc<dyn Error + 'static>,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

impl StreamError {
    /// Wrap an existing error value.
    pub fn new<E: Error + 'static>(error: E) -> Self {
        Self {
            inner: Rc::new(error),
        }
    }

    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// The wrapped error.
    #[must_use]
    pub fn as_error(&self) -> &(dyn Error + 'static) {
        &*self.inner
    }

    /// Borrow the wrapped error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// True when both handles refer to the same error instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &StreamError) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamError").field(&self.inner).finish()
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.as_error())
    }
}

impl From<SchedulerError> for StreamError {
    fn from(error: SchedulerError) -> Self {
        Self::new(error)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
