//! Integration test: scheduler timing over long runs.
//!
//! Validates: a task with period `k * base` runs on ticks `0, k, 2k, ...`
//! and no others; tasks share ticks in slot order; lateness is caught up
//! tick by tick below the drift threshold and rebased above it.

use proptest::prelude::*;
use rtapi_common::config::SchedulerConfig;
use rtapi_core::clock::{ManualClock, Wake};
use rtapi_core::scheduler::Scheduler;
use rtapi_core::task::{Resumption, TaskEntry, TaskId, wait};
use std::cell::RefCell;
use std::rc::Rc;

const BASE: u64 = 1_000_000;

type Runs = Rc<RefCell<Vec<(usize, u64)>>>;

fn scheduler(clock: ManualClock) -> Scheduler<ManualClock> {
    let mut s = Scheduler::new(clock, &SchedulerConfig::default());
    s.clock_set_period(BASE).unwrap();
    s
}

/// Async task recording `(tag, tick)` for every run.
fn recorder(runs: &Runs, tag: usize, clock: &ManualClock) -> TaskEntry {
    let runs = runs.clone();
    let clock = clock.clone();
    TaskEntry::from_async(
        move |()| async move {
            loop {
                runs.borrow_mut().push((tag, clock.now() / BASE));
                wait().await;
            }
        },
        (),
    )
}

fn spawn(s: &mut Scheduler<ManualClock>, entry: TaskEntry, period: u64) -> TaskId {
    let id = s.task_new(entry, 1, 1, 0).unwrap();
    s.task_start(id, period).unwrap();
    id
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn task_runs_exactly_on_multiples_of_ratio(k in 1u64..50) {
        let clock = ManualClock::new(0);
        let runs: Runs = Rc::default();
        let mut s = scheduler(clock.clone());
        spawn(&mut s, recorder(&runs, 0, &clock), k * BASE);

        let ticks = (10 * k).max(10_000);
        for _ in 0..ticks {
            prop_assert_eq!(s.run_once().unwrap(), Wake::Tick);
        }

        let seen: Vec<u64> = runs.borrow().iter().map(|&(_, t)| t).collect();
        let expected: Vec<u64> = (0..ticks).filter(|t| t % k == 0).collect();
        prop_assert_eq!(seen, expected);
    }
}

#[test]
fn four_ms_task_on_one_ms_base() {
    let clock = ManualClock::new(0);
    let runs: Runs = Rc::default();
    let mut s = scheduler(clock.clone());
    let id = spawn(&mut s, recorder(&runs, 0, &clock), 4_000_000);
    assert_eq!(s.task_info(id).unwrap().ratio, 4);

    for _ in 0..=16 {
        s.run_once().unwrap();
    }
    let ticks: Vec<u64> = runs.borrow().iter().map(|&(_, t)| t).collect();
    assert_eq!(ticks, [0, 4, 8, 12, 16]);
}

#[test]
fn shared_ticks_follow_slot_order() {
    let clock = ManualClock::new(0);
    let runs: Runs = Rc::default();
    let mut s = scheduler(clock.clone());
    let slow = spawn(&mut s, recorder(&runs, 0, &clock), 3 * BASE);
    let fast = spawn(&mut s, recorder(&runs, 1, &clock), BASE);
    let mid = spawn(&mut s, recorder(&runs, 2, &clock), 2 * BASE);
    assert!(slow.slot() < fast.slot() && fast.slot() < mid.slot());

    for _ in 0..7 {
        s.run_once().unwrap();
    }
    for tick in 0..7 {
        let order: Vec<usize> = runs
            .borrow()
            .iter()
            .filter(|&&(_, t)| t == tick)
            .map(|&(tag, _)| tag)
            .collect();
        let expected: Vec<usize> = [(0, 3), (1, 1), (2, 2)]
            .into_iter()
            .filter(|&(_, k)| tick % k == 0)
            .map(|(tag, _)| tag)
            .collect();
        assert_eq!(order, expected, "tick {tick}");
    }
}

#[test]
fn deleted_slot_is_reused_without_disturbing_others() {
    let clock = ManualClock::new(0);
    let runs: Runs = Rc::default();
    let mut s = scheduler(clock.clone());
    let a = spawn(&mut s, recorder(&runs, 0, &clock), BASE);
    let b = spawn(&mut s, recorder(&runs, 1, &clock), BASE);
    s.run_once().unwrap();

    s.task_delete(a).unwrap();
    let c = spawn(&mut s, recorder(&runs, 2, &clock), BASE);
    assert_eq!(c.slot(), a.slot());
    s.run_once().unwrap();

    let tick1: Vec<usize> = runs
        .borrow()
        .iter()
        .filter(|&&(_, t)| t == 1)
        .map(|&(tag, _)| tag)
        .collect();
    assert_eq!(tick1, [2, 1]);
    assert!(s.task_info(b).is_ok());
}

#[test]
fn stall_below_threshold_catches_up() {
    let clock = ManualClock::new(0);
    let runs: Runs = Rc::default();
    let mut s = scheduler(clock.clone());
    spawn(&mut s, recorder(&runs, 0, &clock), BASE);

    s.run_once().unwrap();
    clock.advance(10 * BASE);
    for _ in 0..15 {
        s.run_once().unwrap();
    }
    // Every tick ran once despite the stall.
    assert_eq!(runs.borrow().len(), 16);
    assert_eq!(s.tick(), 16);
    assert_eq!(s.stats().resyncs, 0);
    assert_eq!(clock.now(), 15 * BASE);
}

#[test]
fn stall_above_threshold_rebases() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(clock.clone());
    let stall = clock.clone();
    spawn(
        &mut s,
        TaskEntry::from_step(
            move |n: &mut u32| {
                *n += 1;
                if *n == 3 {
                    stall.advance(2_000 * BASE);
                }
                Resumption::Yielded
            },
            0,
        ),
        BASE,
    );

    for _ in 0..3 {
        s.run_once().unwrap();
    }
    let resumed_at = clock.now();
    assert_eq!(s.stats().resyncs, 1);

    // Next tick one base period after the stall, not 2000 catch-up ticks.
    s.run_once().unwrap();
    assert_eq!(clock.now(), resumed_at + BASE);
    assert_eq!(s.tick(), 4);
}

#[test]
fn input_wake_keeps_schedule() {
    let clock = ManualClock::new(0);
    let runs: Runs = Rc::default();
    let mut s = scheduler(clock.clone());
    spawn(&mut s, recorder(&runs, 0, &clock), 2 * BASE);

    s.run_once().unwrap();
    clock.inject_input();
    assert_eq!(s.run_once().unwrap(), Wake::Input);
    assert_eq!(s.run_once().unwrap(), Wake::Tick);
    assert_eq!(s.run_once().unwrap(), Wake::Tick);

    let ticks: Vec<u64> = runs.borrow().iter().map(|&(_, t)| t).collect();
    assert_eq!(ticks, [0, 2]);
}

#[test]
fn finishing_task_stops_running() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(clock);
    let id = spawn(
        &mut s,
        TaskEntry::from_async(
            |n: u32| async move {
                for _ in 0..n {
                    wait().await;
                }
            },
            4,
        ),
        BASE,
    );
    for _ in 0..20 {
        s.step().unwrap();
    }
    let info = s.task_info(id).unwrap();
    assert_eq!(info.resumptions, 5);
    assert_eq!(s.stats().resumptions, 5);
}
