//! The RTAPI surface: one owner for the scheduler, the shared-memory
//! registry and the message queue.
//!
//! Task bodies never hold an [`Rtapi`]. They capture what they need when
//! they are created (a [`Messenger`] clone, segment pointers) and the host
//! calls back into `Rtapi` between ticks.
//!
//! ```rust
//! use rtapi_core::prelude::*;
//! use rtapi_core::clock::ManualClock;
//! use rtapi_shmem::HeapProvider;
//!
//! # fn main() -> RtapiResult<()> {
//! let mut rtapi = Rtapi::new(ManualClock::new(0), HeapProvider::new(), &RtapiConfig::default());
//! rtapi.clock_set_period(1_000_000)?;
//!
//! let msg = rtapi.messenger();
//! let id = rtapi.task_new(
//!     TaskEntry::from_async(
//!         move |name: &'static str| async move {
//!             loop {
//!                 let _ = msg.print("%s tick\n", &[name.into()]);
//!                 wait().await;
//!             }
//!         },
//!         "servo",
//!     ),
//!     prio_highest(),
//!     1,
//!     0,
//! )?;
//! rtapi.task_start(id, 4_000_000)?;
//! rtapi.step()?;
//! assert_eq!(rtapi.task_info(id)?.ratio, 4);
//! # Ok(())
//! # }
//! ```

use crate::clock::{Clock, MonotonicClock, Wake};
use crate::msg::{Messenger, MsgHandler, TracingHandler};
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::stashf::{Arg, Catalog};
use crate::task::{TaskEntry, TaskId, TaskInfo};
use rtapi_common::config::RtapiConfig;
use rtapi_common::error::RtapiResult;
use rtapi_common::level::MsgLevel;
use rtapi_shmem::{SegmentProvider, ShmemId, ShmemRegistry, SysvProvider};
use std::sync::atomic::{AtomicBool, Ordering};

/// Scheduler, shared-memory registry and message queue of one process.
///
/// Confined to the thread that drives the scheduler.
pub struct Rtapi<C: Clock = MonotonicClock, P: SegmentProvider = SysvProvider> {
    // Declared first so task continuations drop before the segments
    // they may point into.
    scheduler: Scheduler<C>,
    shmem: ShmemRegistry<P>,
    messenger: Messenger,
    handler: Box<dyn MsgHandler>,
}

impl<C: Clock, P: SegmentProvider> Rtapi<C, P> {
    /// Runtime with no base period set and messages routed to `tracing`.
    pub fn new(clock: C, provider: P, config: &RtapiConfig) -> Self {
        Self {
            scheduler: Scheduler::new(clock, &config.scheduler),
            shmem: ShmemRegistry::new(provider),
            messenger: Messenger::new(config.messages.level, config.messages.stash_capacity),
            handler: Box::new(TracingHandler),
        }
    }

    /// Route flushed messages to `handler` instead.
    pub fn with_handler<H: MsgHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Box::new(handler);
        self
    }

    // ─── Clock ──────────────────────────────────────────────────────

    /// See [`Scheduler::clock_set_period`].
    pub fn clock_set_period(&mut self, period_ns: u64) -> RtapiResult<u64> {
        self.scheduler.clock_set_period(period_ns)
    }

    // ─── Tasks ──────────────────────────────────────────────────────

    /// Register a task.
    pub fn task_new(
        &mut self,
        entry: TaskEntry,
        priority: i32,
        owner: i32,
        stack_size: usize,
    ) -> RtapiResult<TaskId> {
        self.scheduler.task_new(entry, priority, owner, stack_size)
    }

    /// Start a registered task with `period_ns`.
    pub fn task_start(&mut self, id: TaskId, period_ns: u64) -> RtapiResult<()> {
        self.scheduler.task_start(id, period_ns)
    }

    /// Stop a task and free its slot.
    pub fn task_stop(&mut self, id: TaskId) -> RtapiResult<()> {
        self.scheduler.task_stop(id)
    }

    /// Always `NotImplemented` for a live task.
    pub fn task_pause(&mut self, id: TaskId) -> RtapiResult<()> {
        self.scheduler.task_pause(id)
    }

    /// Always `NotImplemented` for a live task.
    pub fn task_resume(&mut self, id: TaskId) -> RtapiResult<()> {
        self.scheduler.task_resume(id)
    }

    /// Delete a task and free its slot.
    pub fn task_delete(&mut self, id: TaskId) -> RtapiResult<()> {
        self.scheduler.task_delete(id)
    }

    /// Change the period of a started task.
    pub fn task_set_period(&mut self, id: TaskId, period_ns: u64) -> RtapiResult<()> {
        self.scheduler.task_set_period(id, period_ns)
    }

    /// Snapshot of a live task.
    pub fn task_info(&self, id: TaskId) -> RtapiResult<TaskInfo> {
        self.scheduler.task_info(id)
    }

    // ─── Shared Memory ──────────────────────────────────────────────

    /// Open (or create, zero-filled) the segment for `key`.
    pub fn shmem_new(&mut self, key: i32, size: usize) -> RtapiResult<ShmemId> {
        self.shmem.open(key, size)
    }

    /// Mapped address of a segment.
    pub fn shmem_getptr(&self, id: ShmemId) -> RtapiResult<*mut u8> {
        self.shmem.get_ptr(id)
    }

    /// Drop one reference to a segment.
    pub fn shmem_delete(&mut self, id: ShmemId) -> RtapiResult<()> {
        self.shmem.close(id)
    }

    /// Size of the segment behind `id` [bytes].
    pub fn shmem_size(&self, id: ShmemId) -> RtapiResult<usize> {
        self.shmem.size(id)
    }

    /// Number of open handles on the segment behind `id`.
    pub fn shmem_refcount(&self, id: ShmemId) -> RtapiResult<u32> {
        self.shmem.refcount(id)
    }

    // ─── Messages ───────────────────────────────────────────────────

    /// Handle for task bodies to print through.
    pub fn messenger(&self) -> Messenger {
        self.messenger.clone()
    }

    /// Stash a message at `level` if it passes the threshold.
    pub fn print_msg(&self, level: MsgLevel, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
        self.messenger.print_msg(level, format, args)
    }

    /// Stash a message unconditionally.
    pub fn print(&self, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
        self.messenger.print(format, args)
    }

    /// Change the threshold applied by `print_msg`.
    pub fn set_msg_level(&self, level: MsgLevel) -> RtapiResult<()> {
        self.messenger.set_msg_level(level)
    }

    /// Current `print_msg` threshold.
    pub fn get_msg_level(&self) -> MsgLevel {
        self.messenger.get_msg_level()
    }

    /// Translate formats and `%s` arguments through `catalog` on flush.
    pub fn set_catalog<T: Catalog + 'static>(&self, catalog: T) -> RtapiResult<()> {
        self.messenger.set_catalog(catalog)
    }

    /// Render stashed messages into the handler.
    pub fn flush(&mut self) -> RtapiResult<usize> {
        self.messenger.flush(self.handler.as_mut())
    }

    // ─── Run Loop ───────────────────────────────────────────────────

    /// Step one tick immediately and flush.
    pub fn step(&mut self) -> RtapiResult<usize> {
        let resumed = self.scheduler.step()?;
        self.flush()?;
        Ok(resumed)
    }

    /// Pace ticks on the clock until `running` clears or `max_ticks`
    /// ticks have run, flushing messages after each tick.
    ///
    /// Returns the number of ticks run.
    pub fn run(&mut self, running: &AtomicBool, max_ticks: Option<u64>) -> RtapiResult<u64> {
        let mut ticks = 0;
        while running.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| ticks < max) {
            if self.scheduler.run_once()? == Wake::Tick {
                ticks += 1;
            }
            self.flush()?;
        }
        Ok(ticks)
    }

    /// Next tick to be stepped.
    pub fn tick(&self) -> u64 {
        self.scheduler.tick()
    }

    /// Timing statistics.
    pub fn stats(&self) -> &SchedulerStats {
        self.scheduler.stats()
    }

    /// Underlying scheduler.
    pub fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    /// Underlying shared-memory registry.
    pub fn shmem_registry(&self) -> &ShmemRegistry<P> {
        &self.shmem
    }
}
