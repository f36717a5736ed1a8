#![forbid(unsafe_code)]

//! Scheduler errors.

use std::fmt;

/// Scheduling operation a strategy may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// One-shot work at a future point in time.
    Future,
    /// Repeating work on a fixed interval.
    Periodic,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future => f.write_str("schedule_future"),
            Self::Periodic => f.write_str("schedule_periodic"),
        }
    }
}

/// Errors returned by [`Scheduler`](crate::Scheduler) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// The strategy has no notion of time and cannot run the operation.
    Unsupported {
        scheduler: &'static str,
        operation: Operation,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported {
                scheduler,
                operation,
            } => write!(f, "{scheduler} scheduler does not support {operation}"),
        }
    }
}

impl std::error::Error for SchedulerError {}
