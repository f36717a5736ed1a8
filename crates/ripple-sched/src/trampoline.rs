#![forbid(unsafe_code)]

//! Current-thread trampoline scheduler.
//!
//! The first `schedule` call on a thread becomes the drain owner: it creates
//! the queue, runs its own task, then pops and runs queued tasks until the
//! queue is empty. Any `schedule` call made while a drain is active only
//! enqueues. Stack depth therefore stays constant no matter how deeply tasks
//! reschedule each other, and tasks run in submission order.
//!
//! # Invariants
//!
//! 1. At most one drain is active per thread.
//! 2. Tasks scheduled during a drain run in FIFO order within that drain.
//! 3. A task cancelled while queued never runs and its closure is dropped
//!    right away.
//! 4. A panicking task aborts the drain and resets the queue; the next
//!    `schedule` on the thread starts a fresh drain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::cancel::{Cancel, Task};
use crate::scheduler::Scheduler;

type Slot = Rc<Cell<Option<Task>>>;

thread_local! {
    static TRAMPOLINE: RefCell<Option<VecDeque<Slot>>> = const { RefCell::new(None) };
}

/// Serializes tasks on the calling thread through a FIFO trampoline.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentThread;

impl CurrentThread {
    /// True while a drain is running on this thread.
    #[must_use]
    pub fn is_draining() -> bool {
        TRAMPOLINE.with(|slot| slot.borrow().is_some())
    }

    /// Tasks waiting in this thread's queue (cancelled entries included).
    #[must_use]
    pub fn queued() -> usize {
        TRAMPOLINE.with(|slot| slot.borrow().as_ref().map_or(0, VecDeque::len))
    }
}

impl Scheduler for CurrentThread {
    fn name(&self) -> &'static str {
        "current_thread"
    }

    fn schedule(&self, task: Task) -> Cancel {
        let enqueued = TRAMPOLINE.with(move |slot| {
            let mut slot = slot.borrow_mut();
            match slot.as_mut() {
                Some(queue) => {
                    let entry: Slot = Rc::new(Cell::new(Some(task)));
                    queue.push_back(Rc::clone(&entry));
                    Ok(entry)
                }
                None => {
                    *slot = Some(VecDeque::new());
                    Err(task)
                }
            }
        });
        match enqueued {
            Ok(entry) => Cancel::new(move || drop(entry.take())),
            Err(task) => {
                drain(task);
                Cancel::noop()
            }
        }
    }
}

fn drain(first: Task) {
    let _reset = DrainReset;
    first();
    loop {
        let next = TRAMPOLINE.with(|slot| slot.borrow_mut().as_mut().and_then(VecDeque::pop_front));
        let Some(entry) = next else { break };
        if let Some(task) = entry.take() {
            task();
        }
    }
}

/// Clears the thread's queue when the drain ends, normally or by unwinding.
struct DrainReset;

impl Drop for DrainReset {
    fn drop(&mut self) {
        let abandoned = TRAMPOLINE
            .with(|slot| slot.borrow_mut().take())
            .map_or(0, discard);
        if abandoned > 0 {
            tracing::warn!(abandoned, "trampoline drain aborted; discarding queued tasks");
        }
    }
}

/// Drop every queued task, returning how many had not been cancelled.
fn discard(queue: VecDeque<Slot>) -> usize {
    queue.into_iter().filter(|entry| entry.take().is_some()).count()
}
