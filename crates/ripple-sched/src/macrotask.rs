#![forbid(unsafe_code)]

//! Timer-backed ("macrotask") scheduling.
//!
//! [`DefaultScheduler`] defers work through an injected [`Timer`]. Nothing
//! here reads ambient time: tests hand it a [`TimerQueue`](crate::TimerQueue)
//! on a [`VirtualClock`](crate::VirtualClock) and drive it explicitly.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::cancel::{Cancel, RepeatingTask, Task};
use crate::error::SchedulerError;
use crate::scheduler::{Due, Scheduler};
use crate::timer::{Timer, TimerId};

/// Defers tasks to a later timer turn.
#[derive(Clone)]
pub struct DefaultScheduler {
    timer: Rc<dyn Timer>,
}

impl fmt::Debug for DefaultScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultScheduler")
            .field("now", &self.timer.now())
            .finish_non_exhaustive()
    }
}

impl DefaultScheduler {
    pub fn new(timer: Rc<dyn Timer>) -> Self {
        Self { timer }
    }

    pub fn timer(&self) -> &Rc<dyn Timer> {
        &self.timer
    }

    fn clear_on_cancel(&self, id: TimerId) -> Cancel {
        let timer = Rc::clone(&self.timer);
        Cancel::new(move || timer.clear(id))
    }

    fn start_repeating(&self, task: RepeatingTask, interval: Duration) -> Cancel {
        let id = self.timer.set_interval(task, interval);
        self.clear_on_cancel(id)
    }
}

impl Scheduler for DefaultScheduler {
    fn name(&self) -> &'static str {
        "default"
    }

    fn schedule(&self, task: Task) -> Cancel {
        let id = self.timer.set_timeout(task, Duration::ZERO);
        self.clear_on_cancel(id)
    }

    fn schedule_future(&self, task: Task, due: Due) -> Result<Cancel, SchedulerError> {
        let delay = due.delay_from(self.timer.now());
        let id = self.timer.set_timeout(task, delay);
        Ok(self.clear_on_cancel(id))
    }

    /// Without a delay the repeating timer starts now and first fires after
    /// one interval. With a delay, the repeat phase starts when the delay
    /// elapses; the returned cancel covers whichever phase is active.
    fn schedule_periodic(
        &self,
        task: RepeatingTask,
        interval: Duration,
        delay: Option<Due>,
    ) -> Result<Cancel, SchedulerError> {
        let delay = delay.map_or(Duration::ZERO, |due| due.delay_from(self.timer.now()));
        if delay.is_zero() {
            return Ok(self.start_repeating(task, interval));
        }

        let cancelled = Rc::new(Cell::new(false));
        let repeat: Rc<RefCell<Option<Cancel>>> = Rc::new(RefCell::new(None));
        let start = {
            let this = self.clone();
            let cancelled = Rc::clone(&cancelled);
            let repeat = Rc::clone(&repeat);
            self.schedule_future(
                Box::new(move || {
                    if !cancelled.get() {
                        let handle = this.start_repeating(task, interval);
                        *repeat.borrow_mut() = Some(handle);
                    }
                }),
                Due::After(delay),
            )?
        };
        Ok(Cancel::new(move || {
            cancelled.set(true);
            start.cancel();
            let active = repeat.borrow_mut().take();
            if let Some(handle) = active {
                handle.cancel();
            }
        }))
    }
}
