#![forbid(unsafe_code)]

//! Per-thread default scheduler instances.
//!
//! Each thread lazily owns one system-clock [`TimerQueue`]. The timer queue
//! does not run by itself: the thread's event loop calls
//! [`TimerQueue::run_due`] / [`TimerQueue::run_until_idle`] on
//! [`host_timer()`].

use std::rc::Rc;

use crate::clock::SystemClock;
use crate::immediate::Immediate;
use crate::macrotask::DefaultScheduler;
use crate::timer::TimerQueue;
use crate::trampoline::CurrentThread;

thread_local! {
    static HOST_TIMER: Rc<TimerQueue<SystemClock>> = Rc::new(TimerQueue::system());
}

/// This thread's system-clock timer queue.
#[must_use]
pub fn host_timer() -> Rc<TimerQueue<SystemClock>> {
    HOST_TIMER.with(Rc::clone)
}

/// A [`DefaultScheduler`] backed by [`host_timer()`].
#[must_use]
pub fn default_scheduler() -> DefaultScheduler {
    DefaultScheduler::new(host_timer())
}

/// The synchronous strategy.
#[must_use]
pub fn immediate() -> Immediate {
    Immediate
}

/// The trampoline strategy for this thread.
#[must_use]
pub fn current_thread() -> CurrentThread {
    CurrentThread
}
