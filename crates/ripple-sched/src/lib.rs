#![forbid(unsafe_code)]

//! Scheduling strategies for Ripple.
//!
//! # Role in Ripple
//! `ripple-sched` is the leaf crate. It decides *when* deferred work runs and
//! knows nothing about observables; `ripple` builds time-based sources and
//! operators on top of the [`Scheduler`] trait defined here.
//!
//! # Strategies
//! - [`Immediate`]: run now, in the caller's stack frame.
//! - [`CurrentThread`]: FIFO trampoline with bounded stack depth.
//! - [`DefaultScheduler`]: defer through an injected [`Timer`], with one-shot,
//!   absolute-time and periodic scheduling.
//!
//! # Time
//! [`TimerQueue`] is the timer facility. It is parameterized by a [`Clock`]:
//! [`SystemClock`] for real programs, [`VirtualClock`] for deterministic tests.
//!
//! # Threading
//! Everything here is single-threaded (`Rc`, `Cell`). Each OS thread gets
//! its own trampoline queue and its own [`host_timer()`].

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod immediate;
pub mod macrotask;
pub mod scheduler;
pub mod timer;
pub mod trampoline;

pub use cancel::{Cancel, RepeatingTask, Task};
pub use clock::{Clock, SystemClock, Timestamp, VirtualClock};
pub use config::TimerConfig;
pub use error::{Operation, SchedulerError};
pub use host::{current_thread, default_scheduler, host_timer, immediate};
pub use immediate::Immediate;
pub use macrotask::DefaultScheduler;
pub use scheduler::{Due, Scheduler};
pub use timer::{Timer, TimerId, TimerQueue};
pub use trampoline::CurrentThread;
