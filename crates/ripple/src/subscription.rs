#![forbid(unsafe_code)]

//! Subscription handles and teardown actions.
//!
//! # Invariants
//!
//! 1. A [`Teardown`] runs at most once; releasing consumes it.
//! 2. A panic raised while releasing is caught, logged at `warn` and
//!    suppressed. Cleanup never propagates failure.
//! 3. [`Subscription::unsubscribe`] is idempotent. Only the first call does
//!    any work; later calls are no-ops.
//! 4. Dropping a [`Subscription`] leaves the execution running. Use
//!    [`Subscription::guard`] for scope-bound cancellation.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use ripple_sched::Cancel;

use crate::error::panic_message;

/// Release action returned by a producer.
#[must_use]
pub struct Teardown {
    action: Option<Box<dyn FnOnce()>>,
}

impl Teardown {
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// Nothing to release.
    pub fn noop() -> Self {
        Self { action: None }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.action.is_none()
    }

    /// Run the action, suppressing (and logging) any panic it raises.
    pub fn release(mut self) {
        let Some(action) = self.action.take() else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
            tracing::warn!(panic = %panic_message(&*payload), "teardown panicked; suppressed");
        }
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("noop", &self.is_noop())
            .finish()
    }
}

impl From<()> for Teardown {
    fn from((): ()) -> Self {
        Self::noop()
    }
}

impl From<Cancel> for Teardown {
    fn from(cancel: Cancel) -> Self {
        Self {
            action: cancel.into_action(),
        }
    }
}

impl From<Subscription> for Teardown {
    fn from(subscription: Subscription) -> Self {
        if subscription.is_closed() {
            return Self::noop();
        }
        Self::new(move || subscription.unsubscribe())
    }
}

/// Type-erased view of one execution, used by subscriptions and by
/// operators that link child executions to a parent.
pub(crate) trait Release {
    fn is_closed(&self) -> bool;
    fn unsubscribe(&self);
}

/// Handle to a running execution.
#[derive(Clone)]
pub struct Subscription {
    handle: Option<Rc<dyn Release>>,
}

impl Subscription {
    pub(crate) fn from_release(handle: Rc<dyn Release>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// A subscription that is already closed.
    #[must_use]
    pub fn empty() -> Self {
        Self { handle: None }
    }

    /// Stop delivery and release the execution's resources.
    pub fn unsubscribe(&self) {
        if let Some(handle) = &self.handle {
            handle.unsubscribe();
        }
    }

    /// True once the execution terminated or was cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_closed())
    }

    /// Tie the execution to a scope: it is cancelled when the guard drops.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: Some(self),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// RAII wrapper that unsubscribes on drop.
#[must_use = "dropping the guard cancels the subscription immediately"]
pub struct SubscriptionGuard {
    subscription: Option<Subscription>,
}

impl SubscriptionGuard {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_none_or(Subscription::is_closed)
    }

    /// Give up scope ownership without cancelling.
    pub fn disarm(mut self) -> Subscription {
        self.subscription.take().unwrap_or_else(Subscription::empty)
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// How an execution stood when its producer returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscribeOutcome {
    /// Still running; the teardown is held by the execution.
    Live,
    /// Completed or errored before the producer returned.
    CompletedSynchronously,
    /// Cancelled (directly or through a closed parent) before the producer
    /// returned.
    CancelledSynchronously,
}

impl SubscribeOutcome {
    pub(crate) fn is_live(self) -> bool {
        self == Self::Live
    }
}
