#![forbid(unsafe_code)]

//! Time sources for timer-backed scheduling.
//!
//! Time is expressed as a [`Timestamp`]: the elapsed [`Duration`] since the
//! clock's origin. [`SystemClock`] follows the monotonic OS clock and blocks
//! the thread while waiting; [`VirtualClock`] only moves when told to, which
//! makes timer-driven tests fully deterministic.

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, Instant};

/// A point in time on a [`Clock`], measured from that clock's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Self = Self(Duration::ZERO);

    #[must_use]
    pub const fn from_duration(since_origin: Duration) -> Self {
        Self(since_origin)
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Elapsed time since the clock origin.
    #[must_use]
    pub const fn since_origin(self) -> Duration {
        self.0
    }

    /// Duration from `earlier` to `self`, or zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T+{}ms", self.0.as_millis())
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Timestamp;

    /// Block (or jump) until `deadline`. Returns immediately if it has passed.
    fn wait_until(&self, deadline: Timestamp);
}

/// Wall-clock time backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock whose origin is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed())
    }

    fn wait_until(&self, deadline: Timestamp) {
        let remaining = deadline.saturating_duration_since(self.now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Waiting jumps the clock forward; it never moves backwards.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<Timestamp>,
}

impl VirtualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at an arbitrary point.
    #[must_use]
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }

    fn wait_until(&self, deadline: Timestamp) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}
