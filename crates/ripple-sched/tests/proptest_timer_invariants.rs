//! Property-based invariant tests for the timer queue.
//!
//! 1. One-shot timers fire in (deadline, registration) order.
//! 2. Cleared timers never fire.
//! 3. Advancing in arbitrary steps fires the same sequence as one big jump.
//! 4. The virtual clock ends exactly at the requested deadline.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use ripple_sched::{Timer, TimerId, TimerQueue, Timestamp};

// ── Helpers ─────────────────────────────────────────────────────────────

fn delays_strategy() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(0u64..=200, 1..=40)
}

fn register(timers: &TimerQueue<ripple_sched::VirtualClock>, delays: &[u64]) -> (Rc<RefCell<Vec<usize>>>, Vec<TimerId>) {
    let fired = Rc::new(RefCell::new(Vec::new()));
    let ids = delays
        .iter()
        .enumerate()
        .map(|(i, &ms)| {
            let f = Rc::clone(&fired);
            timers.set_timeout(Box::new(move || f.borrow_mut().push(i)), Duration::from_millis(ms))
        })
        .collect();
    (fired, ids)
}

fn expected_order(delays: &[u64], skip: &[bool]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..delays.len()).filter(|&i| !skip[i]).collect();
    order.sort_by_key(|&i| (delays[i], i));
    order
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn one_shots_fire_in_deadline_then_registration_order(delays in delays_strategy()) {
        let timers = TimerQueue::virtual_time();
        let (fired, _) = register(&timers, &delays);
        timers.run_until_idle();
        let skip = vec![false; delays.len()];
        prop_assert_eq!(fired.borrow().clone(), expected_order(&delays, &skip));
    }

    #[test]
    fn cleared_timers_never_fire(
        delays in delays_strategy(),
        mask in proptest::collection::vec(proptest::bool::ANY, 40),
    ) {
        let timers = TimerQueue::virtual_time();
        let (fired, ids) = register(&timers, &delays);
        let skip: Vec<bool> = (0..delays.len()).map(|i| mask[i]).collect();
        for (id, &clear) in ids.iter().zip(&skip) {
            if clear {
                timers.clear(*id);
            }
        }
        timers.run_until_idle();
        prop_assert_eq!(fired.borrow().clone(), expected_order(&delays, &skip));
        prop_assert!(timers.is_idle());
    }

    #[test]
    fn stepwise_advance_matches_single_jump(
        delays in delays_strategy(),
        steps in proptest::collection::vec(1u64..=50, 1..=20),
    ) {
        let stepped = TimerQueue::virtual_time();
        let (stepped_log, _) = register(&stepped, &delays);
        let total: u64 = steps.iter().sum();
        for step in &steps {
            stepped.advance_by(Duration::from_millis(*step));
        }

        let jumped = TimerQueue::virtual_time();
        let (jumped_log, _) = register(&jumped, &delays);
        jumped.advance_by(Duration::from_millis(total));

        prop_assert_eq!(stepped_log.borrow().clone(), jumped_log.borrow().clone());
        prop_assert_eq!(stepped.now(), Timestamp::from_millis(total));
        prop_assert_eq!(jumped.now(), Timestamp::from_millis(total));
    }
}
