//! Time sources for the scheduler.
//!
//! [`MonotonicClock`] paces real runs with `clock_nanosleep(TIMER_ABSTIME)`
//! on `CLOCK_MONOTONIC`. [`ManualClock`] is driven by hand for
//! deterministic tests and simulation.

use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};
use rtapi_common::error::RtapiResult;
use std::cell::Cell;
use std::rc::Rc;

/// Why a sleep returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The deadline was reached.
    Tick,
    /// Woken early by asynchronous input (e.g. a signal).
    Input,
}

/// Monotonic nanosecond clock with absolute sleeps.
pub trait Clock {
    /// Current time [ns].
    fn now_ns(&self) -> RtapiResult<u64>;

    /// Block until `deadline_ns` or until input arrives.
    ///
    /// Returns immediately with `Tick` if the deadline has passed.
    fn sleep_until(&mut self, deadline_ns: u64) -> RtapiResult<Wake>;
}

// ─── Monotonic ──────────────────────────────────────────────────────

const NS_PER_SEC: u64 = 1_000_000_000;

/// `CLOCK_MONOTONIC`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    const ID: ClockId = ClockId::CLOCK_MONOTONIC;
}

fn timespec_to_ns(ts: TimeSpec) -> u64 {
    ts.tv_sec() as u64 * NS_PER_SEC + ts.tv_nsec() as u64
}

fn ns_to_timespec(ns: u64) -> TimeSpec {
    TimeSpec::new((ns / NS_PER_SEC) as _, (ns % NS_PER_SEC) as _)
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> RtapiResult<u64> {
        Ok(timespec_to_ns(clock_gettime(Self::ID)?))
    }

    fn sleep_until(&mut self, deadline_ns: u64) -> RtapiResult<Wake> {
        let ts = ns_to_timespec(deadline_ns);
        match clock_nanosleep(Self::ID, ClockNanosleepFlags::TIMER_ABSTIME, &ts) {
            Ok(_) => Ok(Wake::Tick),
            Err(Errno::EINTR) => Ok(Wake::Input),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Manual ─────────────────────────────────────────────────────────

/// Hand-driven clock. Clones share the same time.
///
/// `sleep_until` jumps straight to the deadline, unless input was
/// injected, in which case it consumes one input and returns
/// [`Wake::Input`] without moving.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    inputs: Rc<Cell<u32>>,
}

impl ManualClock {
    /// Clock reading `start_ns`.
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ns)),
            inputs: Rc::default(),
        }
    }

    /// Current reading.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Move time forward by `ns`.
    pub fn advance(&self, ns: u64) {
        self.now.set(self.now.get() + ns);
    }

    /// Make the next sleep return early with `Wake::Input`.
    pub fn inject_input(&self) {
        self.inputs.set(self.inputs.get() + 1);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> RtapiResult<u64> {
        Ok(self.now.get())
    }

    fn sleep_until(&mut self, deadline_ns: u64) -> RtapiResult<Wake> {
        let pending = self.inputs.get();
        if pending > 0 {
            self.inputs.set(pending - 1);
            return Ok(Wake::Input);
        }
        if self.now.get() < deadline_ns {
            self.now.set(deadline_ns);
        }
        Ok(Wake::Tick)
    }
}
