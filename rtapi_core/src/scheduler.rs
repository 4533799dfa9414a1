//! Cooperative periodic scheduler.
//!
//! ## Timing
//! One base period per tick. A task started with period `P` runs on every
//! tick where `tick % ratio == 0`, `ratio = max(1, P / base)`, so tick 0
//! runs every started task. Within a tick tasks run in ascending slot
//! order, each at most once.
//!
//! ## Pacing
//! [`Scheduler::run_once`] sleeps until the next absolute deadline and then
//! steps. Small lateness is caught up tick by tick; lateness beyond the
//! drift threshold (e.g. a debugger stop) rebases the schedule on "now".
//!
//! The scheduler and everything it owns are confined to one thread.

use crate::clock::{Clock, MonotonicClock, Wake};
use crate::task::{Resumption, TaskEntry, TaskId, TaskInfo, TaskState, TaskTable};
use rtapi_common::config::SchedulerConfig;
use rtapi_common::error::{RtapiError, RtapiResult};
use tracing::debug;

// ─── Statistics ─────────────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks stepped.
    pub ticks: u64,
    /// Task resumptions across all ticks.
    pub resumptions: u64,
    /// Last step duration [ns].
    pub last_step_ns: u64,
    /// Minimum step duration [ns].
    pub min_step_ns: u64,
    /// Maximum step duration [ns].
    pub max_step_ns: u64,
    /// Running sum for average computation.
    pub sum_step_ns: u128,
    /// Steps that took longer than the base period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (time between deadline and actual wake).
    pub max_latency_ns: u64,
    /// Times the schedule was rebased after excessive drift.
    pub resyncs: u64,
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerStats {
    /// Zeroed statistics.
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            resumptions: 0,
            last_step_ns: 0,
            min_step_ns: u64::MAX,
            max_step_ns: 0,
            sum_step_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
            resyncs: 0,
        }
    }

    /// Record one step.
    #[inline]
    pub fn record(&mut self, duration_ns: u64, latency_ns: u64, resumed: usize) {
        self.ticks += 1;
        self.resumptions += resumed as u64;
        self.last_step_ns = duration_ns;
        self.min_step_ns = self.min_step_ns.min(duration_ns);
        self.max_step_ns = self.max_step_ns.max(duration_ns);
        self.sum_step_ns += u128::from(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average step duration [ns] (0 if no ticks).
    #[inline]
    pub fn avg_step_ns(&self) -> u64 {
        if self.ticks == 0 {
            0
        } else {
            (self.sum_step_ns / u128::from(self.ticks)) as u64
        }
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

/// Task table plus the tick loop that drives it.
pub struct Scheduler<C: Clock = MonotonicClock> {
    clock: C,
    tasks: TaskTable,
    /// 0 until `clock_set_period`.
    base_period_ns: u64,
    min_period_ns: u64,
    max_period_ns: u64,
    drift_threshold_ns: u64,
    tick: u64,
    next_deadline_ns: Option<u64>,
    stats: SchedulerStats,
}

impl<C: Clock> Scheduler<C> {
    /// Scheduler with no base period set yet.
    pub fn new(clock: C, config: &SchedulerConfig) -> Self {
        Self {
            clock,
            tasks: TaskTable::new(),
            base_period_ns: 0,
            min_period_ns: config.min_base_period_ns,
            max_period_ns: config.max_base_period_ns,
            drift_threshold_ns: config.drift_threshold_ns,
            tick: 0,
            next_deadline_ns: None,
            stats: SchedulerStats::new(),
        }
    }

    /// Fix the base period, or query it with `period_ns == 0`.
    ///
    /// Returns the base period in effect.
    ///
    /// # Errors
    /// `InvalidArgument` if a period is already set or `period_ns` lies
    /// outside the configured bounds.
    pub fn clock_set_period(&mut self, period_ns: u64) -> RtapiResult<u64> {
        if period_ns == 0 {
            return Ok(self.base_period_ns);
        }
        if self.base_period_ns != 0 {
            return Err(RtapiError::InvalidArgument("base period already set"));
        }
        if period_ns < self.min_period_ns || period_ns > self.max_period_ns {
            return Err(RtapiError::InvalidArgument("base period out of range"));
        }
        self.base_period_ns = period_ns;
        debug!("base period set to {} ns", period_ns);
        Ok(period_ns)
    }

    /// Base period, if set.
    pub fn base_period(&self) -> Option<u64> {
        (self.base_period_ns != 0).then_some(self.base_period_ns)
    }

    fn require_base(&self) -> RtapiResult<u64> {
        self.base_period()
            .ok_or(RtapiError::InvalidArgument("base period not set"))
    }

    /// Clamp `period_ns` up to the base period and derive the ratio.
    fn ratio_for(base: u64, period_ns: u64) -> (u64, u64) {
        let period = period_ns.max(base);
        (period, (period / base).max(1))
    }

    /// Register a task. It does not run until [`task_start`](Self::task_start).
    ///
    /// A `stack_size` of 0 selects the default.
    pub fn task_new(
        &mut self,
        entry: TaskEntry,
        priority: i32,
        owner: i32,
        stack_size: usize,
    ) -> RtapiResult<TaskId> {
        let id = self.tasks.insert(entry, priority, owner, stack_size)?;
        debug!("{} installed, priority {}, owner {}", id, priority, owner);
        Ok(id)
    }

    /// Start a registered task with `period_ns`.
    ///
    /// # Errors
    /// `InvalidArgument` if no base period is set, the handle is stale or
    /// the task was already started.
    pub fn task_start(&mut self, id: TaskId, period_ns: u64) -> RtapiResult<()> {
        let base = self.require_base()?;
        let slot = self.tasks.get_mut(id)?;
        if slot.state != TaskState::Registered {
            return Err(RtapiError::InvalidArgument("task already started"));
        }
        let (period, ratio) = Self::ratio_for(base, period_ns);
        slot.launch(period, ratio)?;
        debug!("{} started, period {} ns, ratio {}", id, period, ratio);
        Ok(())
    }

    /// Change the period of a started task.
    pub fn task_set_period(&mut self, id: TaskId, period_ns: u64) -> RtapiResult<()> {
        let base = self.require_base()?;
        let slot = self.tasks.get_mut(id)?;
        if slot.state == TaskState::Registered {
            return Err(RtapiError::InvalidArgument("task not started"));
        }
        let (period, ratio) = Self::ratio_for(base, period_ns);
        slot.period_ns = period;
        slot.ratio = ratio;
        debug!("{} period {} ns, ratio {}", id, period, ratio);
        Ok(())
    }

    /// Stop a task: its continuation is discarded and the slot freed.
    pub fn task_stop(&mut self, id: TaskId) -> RtapiResult<()> {
        self.tasks.remove(id)?;
        debug!("{} stopped", id);
        Ok(())
    }

    /// Delete a task, freeing its slot.
    pub fn task_delete(&mut self, id: TaskId) -> RtapiResult<()> {
        self.tasks.remove(id)?;
        debug!("{} deleted", id);
        Ok(())
    }

    /// Suspending a continuation from outside is not supported.
    pub fn task_pause(&mut self, id: TaskId) -> RtapiResult<()> {
        self.tasks.get_mut(id)?;
        Err(RtapiError::NotImplemented("task_pause"))
    }

    /// See [`task_pause`](Self::task_pause).
    pub fn task_resume(&mut self, id: TaskId) -> RtapiResult<()> {
        self.tasks.get_mut(id)?;
        Err(RtapiError::NotImplemented("task_resume"))
    }

    /// Snapshot of a live task.
    pub fn task_info(&self, id: TaskId) -> RtapiResult<TaskInfo> {
        self.tasks.info(id)
    }

    /// Live tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Run every task due on the current tick, then advance the tick.
    ///
    /// Returns the number of tasks resumed.
    pub fn step(&mut self) -> RtapiResult<usize> {
        self.step_with_latency(0)
    }

    fn step_with_latency(&mut self, latency_ns: u64) -> RtapiResult<usize> {
        let tick = self.tick;
        let started = self.clock.now_ns()?;

        let mut resumed = 0;
        for (id, slot) in self.tasks.iter_mut() {
            match slot.run_if_due(id, tick) {
                Some(Resumption::Finished) => {
                    resumed += 1;
                    debug!("{} finished after {} resumptions", id, slot.resumptions);
                }
                Some(Resumption::Yielded) => resumed += 1,
                None => {}
            }
        }
        self.tick += 1;

        let duration = self.clock.now_ns()?.saturating_sub(started);
        self.stats.record(duration, latency_ns, resumed);
        if self.base_period_ns != 0 && duration > self.base_period_ns {
            self.stats.overruns += 1;
        }
        Ok(resumed)
    }

    /// Sleep until the next tick and step it.
    ///
    /// The first call steps tick 0 immediately. Returns `Wake::Input`
    /// without stepping if the sleep was interrupted; the same deadline
    /// is kept for the next call.
    pub fn run_once(&mut self) -> RtapiResult<Wake> {
        let base = self.require_base()?;
        let deadline = match self.next_deadline_ns {
            Some(deadline) => deadline,
            None => {
                let now = self.clock.now_ns()?;
                self.next_deadline_ns = Some(now);
                now
            }
        };

        if self.clock.sleep_until(deadline)? == Wake::Input {
            return Ok(Wake::Input);
        }
        let latency = self.clock.now_ns()?.saturating_sub(deadline);
        self.step_with_latency(latency)?;

        let next = deadline + base;
        let now = self.clock.now_ns()?;
        let behind = now.saturating_sub(next);
        if behind > self.drift_threshold_ns {
            self.next_deadline_ns = Some(now + base);
            self.stats.resyncs += 1;
            debug!("schedule resync after {} ns drift at tick {}", behind, self.tick);
        } else {
            self.next_deadline_ns = Some(next);
        }
        Ok(Wake::Tick)
    }

    /// Next tick to be stepped.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Timing statistics.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Deadline of the next tick, once running.
    pub fn next_deadline(&self) -> Option<u64> {
        self.next_deadline_ns
    }

    /// Underlying clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
