//! # RTAPI Core
//!
//! Simulated real-time execution layer: periodic cooperative tasks driven
//! at integer multiples of a base tick, key-addressed shared memory, and
//! deferred `printf`-style messages that are encoded in task context and
//! rendered later where blocking is allowed.
//!
//! ## Module Structure
//!
//! - [`buffer`] - Fixed-capacity byte arena and bounds-checked cursors
//! - [`stashf`] - Format-driven message codec over a [`buffer::Cursor`]
//! - [`msg`] - Message levels, the deferred message queue and its handlers
//! - [`clock`] - Monotonic and hand-driven clocks
//! - [`task`] - Continuations, priorities and the task table
//! - [`scheduler`] - Tick loop, drift recovery and timing statistics
//! - [`rtapi`] - The [`Rtapi`](rtapi::Rtapi) facade tying it all together
//! - [`rt`] - Memory locking, CPU pinning and `SCHED_FIFO` (`rt` feature)
//!
//! ## Concurrency
//!
//! Everything here is single-threaded and cooperative. A task runs until
//! it yields, and tasks never preempt each other or the host.

pub mod buffer;
pub mod clock;
pub mod msg;
pub mod rt;
pub mod rtapi;
pub mod scheduler;
pub mod stashf;
pub mod task;

/// Common re-exports.
pub mod prelude {
    pub use crate::buffer::{Buffer, Cursor};
    pub use crate::clock::{Clock, ManualClock, MonotonicClock, Wake};
    pub use crate::msg::{ConsoleHandler, Messenger, MsgHandler, TracingHandler};
    pub use crate::rtapi::Rtapi;
    pub use crate::scheduler::{Scheduler, SchedulerStats};
    pub use crate::stashf::{Arg, Catalog, NoTranslation};
    pub use crate::task::{
        Resumption, TaskEntry, TaskId, TaskInfo, TaskState, prio_highest, prio_lowest,
        prio_next_higher, prio_next_lower, task_self, wait,
    };
    pub use rtapi_common::prelude::*;
    pub use rtapi_shmem::{HeapProvider, ShmemId, SysvProvider};
}
