#![forbid(unsafe_code)]

//! Task and cancellation handle types shared by every scheduler.

use std::fmt;
use std::rc::Rc;

/// A unit of deferred work that runs at most once.
pub type Task = Box<dyn FnOnce()>;

/// A unit of work that may run any number of times (periodic scheduling).
pub type RepeatingTask = Rc<dyn Fn()>;

/// Release-once cancellation handle returned by a scheduler.
///
/// Calling [`Cancel::cancel`] consumes the handle, so the underlying action
/// can never run twice. Dropping a `Cancel` without calling it leaves the
/// scheduled work in place.
#[must_use = "dropping a Cancel does not cancel the scheduled work"]
pub struct Cancel {
    action: Option<Box<dyn FnOnce()>>,
}

impl Cancel {
    /// Wrap a cancellation action.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A handle that does nothing (the work already ran or cannot be withdrawn).
    pub fn noop() -> Self {
        Self { action: None }
    }

    /// True when cancelling would have no effect.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.action.is_none()
    }

    /// Withdraw the scheduled work.
    pub fn cancel(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }

    /// Extract the raw action, leaving a no-op behind.
    pub fn into_action(mut self) -> Option<Box<dyn FnOnce()>> {
        self.action.take()
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("noop", &self.is_noop())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn cancel_runs_action_once() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let cancel = Cancel::new(move || h.set(h.get() + 1));
        assert!(!cancel.is_noop());
        cancel.cancel();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn noop_has_no_action() {
        let cancel = Cancel::noop();
        assert!(cancel.is_noop());
        assert!(cancel.into_action().is_none());
    }

    #[test]
    fn dropping_does_not_cancel() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        drop(Cancel::new(move || h.set(1)));
        assert_eq!(hits.get(), 0);
    }
}
