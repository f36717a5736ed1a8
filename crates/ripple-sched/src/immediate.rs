#![forbid(unsafe_code)]

//! Synchronous scheduling in the caller's context.

use crate::cancel::{Cancel, Task};
use crate::scheduler::Scheduler;

/// Runs every task right away. The returned cancel is a no-op because the
/// task has already finished by the time the caller receives it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn name(&self) -> &'static str {
        "immediate"
    }

    fn schedule(&self, task: Task) -> Cancel {
        task();
        Cancel::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Operation, SchedulerError};
    use crate::scheduler::Due;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn runs_before_returning() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        let cancel = Immediate.schedule(Box::new(move || r.set(true)));
        assert!(ran.get());
        assert!(cancel.is_noop());
    }

    #[test]
    fn timed_operations_are_unsupported() {
        let err = Immediate
            .schedule_future(Box::new(|| {}), Due::After(Duration::ZERO))
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::Unsupported {
                scheduler: "immediate",
                operation: Operation::Future,
            }
        );
        assert!(
            Immediate
                .schedule_periodic(Rc::new(|| {}), Duration::from_millis(1), None)
                .is_err()
        );
    }
}
