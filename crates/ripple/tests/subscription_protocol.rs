//! End-to-end checks of the subscribe/unsubscribe lifecycle.
//!
//! Covers the termination rules (nothing after `error`/`complete`),
//! cleanup ordering when user callbacks panic, suppression of teardown
//! panics, and the default scheduler driven on virtual time.

use std::cell::{Cell, RefCell};
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ripple::prelude::*;
use ripple::scheduler::{DefaultScheduler, Timer, TimerQueue, Timestamp};
use tracing::Level;

// ── Helpers ─────────────────────────────────────────────────────────────

type Log = Rc<RefCell<Vec<String>>>;

fn recorder(log: &Log) -> Observer<i32> {
    let (n, e, c) = (Rc::clone(log), Rc::clone(log), Rc::clone(log));
    Observer::from_next(move |v: i32| n.borrow_mut().push(format!("next {v}")))
        .on_error(move |err| e.borrow_mut().push(format!("error {err}")))
        .on_complete(move || c.borrow_mut().push("complete".to_string()))
}

/// Teardown that appends `label` to `log` when released.
fn marker(log: &Log, label: &'static str) -> Teardown {
    let log = Rc::clone(log);
    Teardown::new(move || log.borrow_mut().push(label.to_string()))
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_warnings(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(Level::WARN)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    captured.text()
}

// ── Termination ─────────────────────────────────────────────────────────

#[test]
fn nothing_is_delivered_after_complete() {
    let log: Log = Rc::default();
    let teardown_log = Rc::clone(&log);
    let source = Observable::new(move |s: Subscriber<i32>| {
        s.next(1);
        s.complete();
        s.next(2);
        s.complete();
        s.error(StreamError::msg("late"));
        marker(&teardown_log, "teardown")
    });
    let sub = source.subscribe(recorder(&log));
    sub.unsubscribe();
    sub.unsubscribe();
    assert_eq!(*log.borrow(), vec!["next 1", "complete", "teardown"]);
}

#[test]
fn asynchronous_error_then_unsubscribe_is_noop() {
    let log: Log = Rc::default();
    let handle: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::default();
    let h = Rc::clone(&handle);
    let teardown_log = Rc::clone(&log);
    let source = Observable::new(move |s: Subscriber<i32>| {
        *h.borrow_mut() = Some(s);
        marker(&teardown_log, "teardown")
    });
    let sub = source.subscribe(recorder(&log));
    assert!(!sub.is_closed());

    let producer = handle.borrow().clone();
    let producer = producer.map(|p| {
        p.next(7);
        p.error(StreamError::msg("gone"));
        p
    });
    sub.unsubscribe();
    if let Some(p) = producer {
        p.next(8);
    }

    assert!(sub.is_closed());
    assert_eq!(*log.borrow(), vec!["next 7", "error gone", "teardown"]);
}

#[test]
fn termination_handler_runs_before_teardown() {
    let log: Log = Rc::default();
    let handle: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::default();
    let h = Rc::clone(&handle);
    let teardown_log = Rc::clone(&log);
    Observable::new(move |s: Subscriber<i32>| {
        *h.borrow_mut() = Some(s);
        marker(&teardown_log, "teardown")
    })
    .subscribe(recorder(&log));

    let producer = handle.borrow().clone();
    if let Some(p) = producer {
        p.complete();
    }
    assert_eq!(*log.borrow(), vec!["complete", "teardown"]);
}

#[test]
fn guard_cancels_at_scope_end() {
    let log: Log = Rc::default();
    let teardown_log = Rc::clone(&log);
    let source = Observable::new(move |_: Subscriber<i32>| marker(&teardown_log, "teardown"));
    {
        let _guard = source.subscribe(recorder(&log)).guard();
        assert!(log.borrow().is_empty());
    }
    assert_eq!(*log.borrow(), vec!["teardown"]);
}

// ── Panicking callbacks ─────────────────────────────────────────────────

#[test]
fn panicking_next_tears_down_before_unwinding() {
    let log: Log = Rc::default();
    let handle: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::default();
    let h = Rc::clone(&handle);
    let teardown_log = Rc::clone(&log);
    let sub = Observable::new(move |s: Subscriber<i32>| {
        *h.borrow_mut() = Some(s);
        marker(&teardown_log, "teardown")
    })
    .subscribe(Observer::from_next(|_: i32| panic!("handler boom")));

    let producer = handle.borrow().clone();
    let result = catch_unwind(AssertUnwindSafe(|| {
        if let Some(p) = &producer {
            p.next(1);
        }
    }));

    assert!(result.is_err());
    assert_eq!(*log.borrow(), vec!["teardown"]);
    assert!(sub.is_closed());
    if let Some(p) = producer {
        p.next(2);
        assert!(p.is_closed());
    }
}

#[test]
fn panicking_complete_still_releases() {
    let log: Log = Rc::default();
    let teardown_log = Rc::clone(&log);
    let handle: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::default();
    let h = Rc::clone(&handle);
    Observable::new(move |s: Subscriber<i32>| {
        *h.borrow_mut() = Some(s);
        marker(&teardown_log, "teardown")
    })
    .subscribe(Observer::new().on_complete(|| panic!("complete boom")));

    let producer = handle.borrow().clone();
    let result = catch_unwind(AssertUnwindSafe(|| {
        if let Some(p) = &producer {
            p.complete();
        }
    }));
    assert!(result.is_err());
    assert_eq!(*log.borrow(), vec!["teardown"]);
}

// ── Teardown panics ─────────────────────────────────────────────────────

#[test]
fn teardown_panic_is_logged_and_siblings_still_run() {
    let released = Rc::new(Cell::new(0));
    let r = Rc::clone(&released);
    let healthy = Observable::new(move |_: Subscriber<i32>| {
        let r = Rc::clone(&r);
        Teardown::new(move || r.set(r.get() + 1))
    });
    let faulty = Observable::new(|_: Subscriber<i32>| Teardown::new(|| panic!("teardown boom")));
    let merged = Observable::of([faulty, healthy.clone(), healthy]).merge_all();

    let output = with_captured_warnings(|| {
        let sub = merged.subscribe(Observer::new());
        sub.unsubscribe();
    });

    assert_eq!(released.get(), 2);
    assert!(output.contains("teardown panicked"), "{output}");
    assert!(output.contains("teardown boom"), "{output}");
}

// ── Default scheduler on virtual time ───────────────────────────────────

#[test]
fn past_absolute_due_runs_next_turn() {
    let timers = Rc::new(TimerQueue::virtual_time());
    let scheduler = DefaultScheduler::new(timers.clone() as Rc<dyn Timer>);
    timers.advance_by(Duration::from_millis(50));

    let ran = Rc::new(Cell::new(false));
    let r = Rc::clone(&ran);
    let _cancel = scheduler
        .schedule_future(Box::new(move || r.set(true)), Due::At(Timestamp::from_millis(10)));
    assert!(!ran.get());
    timers.run_due();
    assert!(ran.get());
}

#[test]
fn periodic_cancel_during_delay_prevents_repeat() {
    let timers = Rc::new(TimerQueue::virtual_time());
    let scheduler = DefaultScheduler::new(timers.clone() as Rc<dyn Timer>);
    let ticks = Rc::new(Cell::new(0));
    let t = Rc::clone(&ticks);
    let cancel = scheduler.schedule_periodic(
        Rc::new(move || t.set(t.get() + 1)),
        Duration::from_millis(5),
        Some(Due::After(Duration::from_millis(20))),
    );
    timers.advance_by(Duration::from_millis(10));
    if let Ok(cancel) = cancel {
        cancel.cancel();
    }
    timers.advance_by(Duration::from_millis(100));
    assert_eq!(ticks.get(), 0);
    assert!(timers.is_idle());
}

#[test]
fn interval_unsubscribe_stops_ticks() {
    let timers = Rc::new(TimerQueue::virtual_time());
    let scheduler: Rc<dyn Scheduler> =
        Rc::new(DefaultScheduler::new(timers.clone() as Rc<dyn Timer>));
    let log: Log = Rc::default();
    let l = Rc::clone(&log);
    let sub = Observable::interval_on(Duration::from_millis(10), scheduler)
        .map(|n| n * 10)
        .subscribe_next(move |v| l.borrow_mut().push(v.to_string()));

    timers.advance_by(Duration::from_millis(30));
    sub.unsubscribe();
    timers.advance_by(Duration::from_millis(30));
    assert_eq!(*log.borrow(), vec!["0", "10", "20"]);
    assert!(timers.is_idle());
}
