#![forbid(unsafe_code)]

//! The scheduler strategy trait.

use std::time::Duration;

use crate::cancel::{Cancel, RepeatingTask, Task};
use crate::clock::Timestamp;
use crate::error::{Operation, SchedulerError};

/// When a future task should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// After a relative delay.
    After(Duration),
    /// At an absolute point on the scheduler's clock.
    At(Timestamp),
}

impl Due {
    /// Normalize to a relative delay from `now`, floored at zero.
    #[must_use]
    pub fn delay_from(self, now: Timestamp) -> Duration {
        match self {
            Due::After(delay) => delay,
            Due::At(at) => at.saturating_duration_since(now),
        }
    }
}

impl From<Duration> for Due {
    fn from(delay: Duration) -> Self {
        Due::After(delay)
    }
}

impl From<Timestamp> for Due {
    fn from(at: Timestamp) -> Self {
        Due::At(at)
    }
}

/// Strategy deciding when and how deferred work runs.
///
/// Only [`schedule`](Scheduler::schedule) is mandatory. Strategies without a
/// notion of time keep the default `schedule_future`/`schedule_periodic`,
/// which report [`SchedulerError::Unsupported`].
pub trait Scheduler {
    /// Short name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Run `task` according to the strategy.
    fn schedule(&self, task: Task) -> Cancel;

    /// Run `task` once when `due` is reached.
    fn schedule_future(&self, task: Task, due: Due) -> Result<Cancel, SchedulerError> {
        drop((task, due));
        Err(SchedulerError::Unsupported {
            scheduler: self.name(),
            operation: Operation::Future,
        })
    }

    /// Run `task` every `interval`, optionally after an initial `delay`.
    fn schedule_periodic(
        &self,
        task: RepeatingTask,
        interval: Duration,
        delay: Option<Due>,
    ) -> Result<Cancel, SchedulerError> {
        drop((task, interval, delay));
        Err(SchedulerError::Unsupported {
            scheduler: self.name(),
            operation: Operation::Periodic,
        })
    }
}
