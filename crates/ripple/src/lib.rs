#![forbid(unsafe_code)]

//! Ripple: push-based observables for single-threaded Rust.
//!
//! # Role
//! An [`Observable`] is a lazy, repeatable event source. Subscribing runs its
//! producer against a fresh execution; the returned [`Subscription`] cancels
//! it. Operators ([`map`](Observable::map), [`take`](Observable::take),
//! [`merge`](Observable::merge), ...) build new observables without running
//! anything.
//!
//! # Guarantees
//! - After `error` or `complete`, an execution delivers nothing more.
//! - `unsubscribe` is idempotent and runs the producer's teardown once.
//! - A panic in a user callback tears the execution down before it reaches
//!   the caller. A panic in a teardown is logged and suppressed.
//!
//! # Scheduling
//! Time and deferral come from [`scheduler`] (the `ripple-sched` crate):
//! immediate, trampolined and timer-backed strategies.
//!
//! # Example
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ripple::prelude::*;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! Observable::of([1, 2, 3])
//!     .map(|x| x * 2)
//!     .subscribe_next(move |x| sink.borrow_mut().push(x));
//! assert_eq!(*seen.borrow(), vec![2, 4, 6]);
//! ```

pub mod error;
pub mod observable;
pub mod observer;
pub mod operators;
pub mod promise;
pub mod source;
pub mod subscriber;
pub mod subscription;

pub use ripple_sched as scheduler;

pub use error::StreamError;
pub use observable::Observable;
pub use observer::Observer;
pub use promise::{Promise, Resolver};
pub use source::{IntoSource, Resolvable, Source};
pub use subscriber::Subscriber;
pub use subscription::{Subscription, SubscriptionGuard, Teardown};

/// Common imports.
pub mod prelude {
    pub use crate::scheduler::{Cancel, Due, Scheduler};
    pub use crate::{
        IntoSource, Observable, Observer, Promise, StreamError, Subscriber, Subscription,
        Teardown,
    };
}
