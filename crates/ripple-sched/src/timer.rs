#![forbid(unsafe_code)]

//! Single-threaded timer facility.
//!
//! # Design
//!
//! [`TimerQueue`] keeps a min-heap of deadlines keyed by `(deadline, seq)`,
//! where `seq` is a registration counter. Task bodies live in a side table
//! keyed by [`TimerId`]; clearing a timer removes the body and leaves the heap
//! entry to be skipped lazily.
//!
//! # Turns
//!
//! [`TimerQueue::run_due`] is one turn: it fires every timer that is due
//! *and* was registered before the turn began. Timers registered by a firing
//! task (including zero-delay ones) wait for the next turn, so a task that
//! keeps rescheduling itself cannot starve a turn.
//!
//! # Invariants
//!
//! 1. Timers fire in deadline order; equal deadlines fire in registration order.
//! 2. A cleared timer never fires afterwards, even if it is already due.
//! 3. A repeating timer is re-armed before its task runs, so the task may
//!    clear its own id.
//! 4. No internal borrow is held while a task runs.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Task panics | Bug in user code | Panic propagates out of `run_*`; queue stays consistent |
//! | Late wakeup | Slow system clock driver | Missed repeat ticks are skipped, not replayed |
//! | Endless zero-delay chain | Task always reschedules | `run_until_idle` never returns |

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::cancel::{RepeatingTask, Task};
use crate::clock::{Clock, SystemClock, Timestamp, VirtualClock};
use crate::config::TimerConfig;

/// Opaque identifier of a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Host timer capability: delay-based one-shot and repeating execution with
/// cancellation.
pub trait Timer {
    /// Current time on the timer's clock.
    fn now(&self) -> Timestamp;

    /// Run `task` once after `delay`.
    fn set_timeout(&self, task: Task, delay: Duration) -> TimerId;

    /// Run `task` every `interval`, first after one interval.
    fn set_interval(&self, task: RepeatingTask, interval: Duration) -> TimerId;

    /// Withdraw a timer. Unknown or already fired ids are ignored.
    fn clear(&self, id: TimerId);
}

enum Scheduled {
    Once(Task),
    Every {
        task: RepeatingTask,
        interval: Duration,
    },
}

enum Job {
    Once(Task),
    Every(RepeatingTask),
}

impl Job {
    fn run(self) {
        match self {
            Job::Once(task) => task(),
            Job::Every(task) => task(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Timestamp,
    seq: u64,
    id: TimerId,
}

#[derive(Default)]
struct TimerState {
    deadlines: BinaryHeap<Reverse<Deadline>>,
    scheduled: HashMap<TimerId, Scheduled>,
    next_id: u64,
    next_seq: u64,
}

impl TimerState {
    fn arm(&mut self, id: TimerId, at: Timestamp) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.deadlines.push(Reverse(Deadline { at, seq, id }));
    }

    fn insert(&mut self, at: Timestamp, scheduled: Scheduled) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.scheduled.insert(id, scheduled);
        self.arm(id, at);
        id
    }

    /// Pop the next job that is due at `now` and older than `horizon`.
    fn pop_due(&mut self, now: Timestamp, horizon: u64) -> Option<Job> {
        loop {
            let Reverse(top) = *self.deadlines.peek()?;
            if top.at > now || top.seq >= horizon {
                return None;
            }
            self.deadlines.pop();
            match self.scheduled.remove(&top.id) {
                None => continue,
                Some(Scheduled::Once(task)) => return Some(Job::Once(task)),
                Some(Scheduled::Every { task, interval }) => {
                    let mut next = top.at + interval;
                    if next <= now {
                        next = now + interval;
                    }
                    let job = Job::Every(RepeatingTask::clone(&task));
                    self.scheduled
                        .insert(top.id, Scheduled::Every { task, interval });
                    self.arm(top.id, next);
                    return Some(job);
                }
            }
        }
    }

    fn next_deadline(&mut self) -> Option<Timestamp> {
        while let Some(Reverse(top)) = self.deadlines.peek().copied() {
            if self.scheduled.contains_key(&top.id) {
                return Some(top.at);
            }
            self.deadlines.pop();
        }
        None
    }
}

/// Deadline-ordered timer queue driven explicitly by its owner.
///
/// Nothing fires on its own: call one of the `run_*` methods to advance
/// time. On a [`SystemClock`] the drivers sleep until the next deadline; on a
/// [`VirtualClock`] they jump straight to it.
pub struct TimerQueue<C: Clock = SystemClock> {
    clock: C,
    config: TimerConfig,
    state: RefCell<TimerState>,
}

impl<C: Clock> fmt::Debug for TimerQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("now", &self.clock.now())
            .field("pending", &self.pending())
            .field("config", &self.config)
            .finish()
    }
}

impl TimerQueue<SystemClock> {
    /// A queue on the system clock, configured from the environment.
    #[must_use]
    pub fn system() -> Self {
        Self::with_config(SystemClock::new(), TimerConfig::from_env())
    }
}

impl TimerQueue<VirtualClock> {
    /// A queue on a virtual clock starting at [`Timestamp::ZERO`].
    #[must_use]
    pub fn virtual_time() -> Self {
        Self::new(VirtualClock::new())
    }

    /// Advance virtual time by `by`, firing everything that falls due.
    pub fn advance_by(&self, by: Duration) -> usize {
        self.run_for(by)
    }

    /// Advance virtual time to `deadline`, firing everything that falls due.
    pub fn advance_to(&self, deadline: Timestamp) -> usize {
        self.run_until(deadline)
    }
}

impl<C: Clock> TimerQueue<C> {
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, TimerConfig::default())
    }

    #[must_use]
    pub fn with_config(clock: C, config: TimerConfig) -> Self {
        Self {
            clock,
            config,
            state: RefCell::new(TimerState::default()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Number of registered timers (repeating timers count once).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().scheduled.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Earliest deadline among live timers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.state.borrow_mut().next_deadline()
    }

    /// Run one turn at the current time. Returns the number of tasks fired.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now();
        let horizon = self.state.borrow().next_seq;
        let mut fired = 0;
        loop {
            let job = self.state.borrow_mut().pop_due(now, horizon);
            let Some(job) = job else { break };
            fired += 1;
            job.run();
        }
        if fired > 0 {
            tracing::debug!(%now, fired, "timer turn");
        }
        fired
    }

    /// Fire timers in deadline order until `deadline`, leaving the clock there.
    pub fn run_until(&self, deadline: Timestamp) -> usize {
        let mut fired = 0;
        loop {
            fired += self.run_due();
            match self.next_deadline() {
                Some(next) if next <= deadline => self.clock.wait_until(next),
                _ => break,
            }
        }
        self.clock.wait_until(deadline);
        fired
    }

    /// Fire timers for `duration` from now.
    pub fn run_for(&self, duration: Duration) -> usize {
        self.run_until(self.clock.now() + duration)
    }

    /// Fire timers until none remain. Never returns while a repeating timer
    /// is registered.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            fired += self.run_due();
            match self.next_deadline() {
                Some(next) => self.clock.wait_until(next),
                None => break,
            }
        }
        fired
    }
}

impl<C: Clock> Timer for TimerQueue<C> {
    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn set_timeout(&self, task: Task, delay: Duration) -> TimerId {
        let at = self.clock.now() + delay;
        let id = self.state.borrow_mut().insert(at, Scheduled::Once(task));
        tracing::debug!(timer = %id, %at, "timeout registered");
        id
    }

    fn set_interval(&self, task: RepeatingTask, interval: Duration) -> TimerId {
        let interval = interval.max(self.config.min_interval);
        let at = self.clock.now() + interval;
        let id = self
            .state
            .borrow_mut()
            .insert(at, Scheduled::Every { task, interval });
        tracing::debug!(timer = %id, ?interval, "interval registered");
        id
    }

    fn clear(&self, id: TimerId) {
        if self.state.borrow_mut().scheduled.remove(&id).is_some() {
            tracing::debug!(timer = %id, "timer cleared");
        }
    }
}
