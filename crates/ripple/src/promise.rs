#![forbid(unsafe_code)]

//! Single-threaded settle-once values.
//!
//! A [`Promise`] is the read side; its [`Resolver`] settles it. Settlement
//! happens once. Continuations registered before settlement run in
//! registration order when it happens; those registered afterwards run
//! immediately, on the caller's stack.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Resolver dropped unsettled | promise rejects with "promise abandoned" |
//! | Second settle attempt | impossible: settling consumes the resolver |
//! | Continuation panics | propagates to whoever settled the promise |

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use crate::error::StreamError;
use crate::source::Resolvable;
use crate::subscription::Teardown;

struct Waiter<T> {
    resolve: Box<dyn FnOnce(T)>,
    reject: Box<dyn FnOnce(StreamError)>,
}

enum State<T> {
    Pending {
        waiters: BTreeMap<u64, Waiter<T>>,
        next_waiter: u64,
    },
    Resolved(T),
    Rejected(StreamError),
}

impl<T> State<T> {
    fn pending() -> Self {
        State::Pending {
            waiters: BTreeMap::new(),
            next_waiter: 0,
        }
    }
}

/// Read side of a settle-once value.
pub struct Promise<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.state.borrow() {
            State::Pending { .. } => "pending",
            State::Resolved(_) => "resolved",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Promise").field("status", &status).finish()
    }
}

/// Write side of a [`Promise`].
pub struct Resolver<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// An unsettled promise and the resolver that settles it.
    #[must_use]
    pub fn pending() -> (Promise<T>, Resolver<T>) {
        let state = Rc::new(RefCell::new(State::pending()));
        (
            Promise {
                state: Rc::clone(&state),
            },
            Resolver { state },
        )
    }

    pub fn resolved(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Resolved(value))),
        }
    }

    pub fn rejected(error: StreamError) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Rejected(error))),
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(*self.state.borrow(), State::Pending { .. })
    }

    /// Register continuations. Releasing the returned teardown before
    /// settlement withdraws them.
    pub fn then(
        &self,
        resolve: impl FnOnce(T) + 'static,
        reject: impl FnOnce(StreamError) + 'static,
    ) -> Teardown {
        self.register(Box::new(resolve), Box::new(reject))
    }

    fn register(
        &self,
        resolve: Box<dyn FnOnce(T)>,
        reject: Box<dyn FnOnce(StreamError)>,
    ) -> Teardown {
        let settled = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Pending {
                    waiters,
                    next_waiter,
                } => {
                    let id = *next_waiter;
                    *next_waiter += 1;
                    waiters.insert(id, Waiter { resolve, reject });
                    return withdraw(Rc::downgrade(&self.state), id);
                }
                State::Resolved(value) => Ok(value.clone()),
                State::Rejected(error) => Err(error.clone()),
            }
        };
        match settled {
            Ok(value) => resolve(value),
            Err(error) => reject(error),
        }
        Teardown::noop()
    }
}

fn withdraw<T: 'static>(state: Weak<RefCell<State<T>>>, id: u64) -> Teardown {
    Teardown::new(move || {
        let Some(state) = state.upgrade() else {
            return;
        };
        let removed = match &mut *state.borrow_mut() {
            State::Pending { waiters, .. } => waiters.remove(&id),
            _ => None,
        };
        drop(removed);
    })
}

impl<T: Clone + 'static> Resolvable<T> for Promise<T> {
    fn on_settle(
        &self,
        resolve: Box<dyn FnOnce(T)>,
        reject: Box<dyn FnOnce(StreamError)>,
    ) -> Teardown {
        self.register(resolve, reject)
    }
}

impl<T: Clone> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: StreamError) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<T, StreamError>) {
        let settled = match &outcome {
            Ok(value) => State::Resolved(value.clone()),
            Err(error) => State::Rejected(error.clone()),
        };
        let previous = {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, State::Pending { .. }) {
                return;
            }
            mem::replace(&mut *state, settled)
        };
        let State::Pending { waiters, .. } = previous else {
            return;
        };
        for waiter in waiters.into_values() {
            match &outcome {
                Ok(value) => (waiter.resolve)(value.clone()),
                Err(error) => (waiter.reject)(error.clone()),
            }
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        let abandoned = {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, State::Pending { .. }) {
                return;
            }
            mem::replace(
                &mut *state,
                State::Rejected(StreamError::msg("promise abandoned")),
            )
        };
        tracing::debug!("resolver dropped before settling");
        if let State::Pending { waiters, .. } = abandoned {
            let error = StreamError::msg("promise abandoned");
            for waiter in waiters.into_values() {
                (waiter.reject)(error.clone());
            }
        }
    }
}
