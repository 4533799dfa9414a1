//! Cooperative tasks and the fixed task table.
//!
//! A task body is a [`Continuation`]: the scheduler calls `resume()` once
//! per scheduled tick and the body runs until it yields. Bodies are
//! written either as `async` blocks that `.await` [`wait()`] at every
//! yield point, or as step functions that return [`Resumption::Yielded`].
//!
//! ```rust
//! use rtapi_core::task::{TaskEntry, wait};
//!
//! let entry = TaskEntry::from_async(
//!     |limit: u32| async move {
//!         for _ in 0..limit {
//!             // one period of work
//!             wait().await;
//!         }
//!     },
//!     10,
//! );
//! # drop(entry);
//! ```
//!
//! ## States
//! `Free -> Registered (task_new) -> Running (task_start) -> Ended`
//! (body returned). Stop and delete return the slot to `Free`.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use rtapi_common::consts::{RTAPI_DEFAULT_STACK_SIZE, RTAPI_MAX_TASKS, RTAPI_PRIO_HIGHEST, RTAPI_PRIO_LOWEST};
use rtapi_common::error::{RtapiError, RtapiResult};
use std::cell::Cell;

// ─── Continuations ──────────────────────────────────────────────────

/// Outcome of one resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumption {
    /// The body yielded and wants its next tick.
    Yielded,
    /// The body returned; it is never resumed again.
    Finished,
}

/// Suspendable task body.
pub trait Continuation {
    /// Run until the next yield point.
    fn resume(&mut self) -> Resumption;
}

struct FutureTask {
    fut: Pin<Box<dyn Future<Output = ()>>>,
}

impl Continuation for FutureTask {
    fn resume(&mut self) -> Resumption {
        let mut cx = Context::from_waker(Waker::noop());
        match self.fut.as_mut().poll(&mut cx) {
            Poll::Ready(()) => Resumption::Finished,
            Poll::Pending => Resumption::Yielded,
        }
    }
}

struct StepTask<F, A> {
    code: F,
    arg: A,
}

impl<F, A> Continuation for StepTask<F, A>
where
    F: FnMut(&mut A) -> Resumption,
{
    fn resume(&mut self) -> Resumption {
        (self.code)(&mut self.arg)
    }
}

/// Yield point for `async` task bodies.
///
/// Suspends the task until its next scheduled tick.
pub fn wait() -> Wait {
    Wait { yielded: false }
}

/// Future returned by [`wait()`].
#[derive(Debug)]
#[must_use = "a wait does nothing unless awaited"]
pub struct Wait {
    yielded: bool,
}

impl Future for Wait {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}

/// Task code and argument, turned into a continuation at `task_start`.
pub struct TaskEntry {
    make: Box<dyn FnOnce() -> Box<dyn Continuation>>,
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TaskEntry")
    }
}

impl TaskEntry {
    /// `code(arg)` produces the future the task polls.
    pub fn from_async<A, F, Fut>(code: F, arg: A) -> Self
    where
        A: 'static,
        F: FnOnce(A) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Self {
            make: Box::new(move || -> Box<dyn Continuation> {
                Box::new(FutureTask {
                    fut: Box::pin(code(arg)),
                })
            }),
        }
    }

    /// `code(&mut arg)` runs once per resumption.
    pub fn from_step<A, F>(code: F, arg: A) -> Self
    where
        A: 'static,
        F: FnMut(&mut A) -> Resumption + 'static,
    {
        Self {
            make: Box::new(move || -> Box<dyn Continuation> { Box::new(StepTask { code, arg }) }),
        }
    }

    /// Use a ready-made continuation.
    pub fn from_continuation<C: Continuation + 'static>(continuation: C) -> Self {
        Self {
            make: Box::new(move || -> Box<dyn Continuation> { Box::new(continuation) }),
        }
    }

    fn start(self) -> Box<dyn Continuation> {
        (self.make)()
    }
}

// ─── Current Task ───────────────────────────────────────────────────

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
}

/// Id of the task being resumed, `None` outside a resumption.
pub fn task_self() -> Option<TaskId> {
    CURRENT_TASK.with(Cell::get)
}

/// Marks `id` as current for the lifetime of the guard.
struct CurrentGuard;

impl CurrentGuard {
    fn enter(id: TaskId) -> Self {
        CURRENT_TASK.with(|c| c.set(Some(id)));
        Self
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        CURRENT_TASK.with(|c| c.set(None));
    }
}

// ─── Priorities ─────────────────────────────────────────────────────
//
// Lower number = higher priority.

/// Highest usable priority.
pub const fn prio_highest() -> i32 {
    RTAPI_PRIO_HIGHEST
}

/// Lowest usable priority.
pub const fn prio_lowest() -> i32 {
    RTAPI_PRIO_LOWEST
}

/// One step towards `prio_highest()`, saturating.
pub fn prio_next_higher(prio: i32) -> i32 {
    (prio - 1).clamp(RTAPI_PRIO_HIGHEST, RTAPI_PRIO_LOWEST)
}

/// One step towards `prio_lowest()`, saturating.
pub fn prio_next_lower(prio: i32) -> i32 {
    prio.saturating_add(1).clamp(RTAPI_PRIO_HIGHEST, RTAPI_PRIO_LOWEST)
}

// ─── Task Table ─────────────────────────────────────────────────────

/// Handle to a task slot.
///
/// Carries the slot generation, so a handle kept past `task_delete` is
/// rejected even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    slot: u16,
    generation: u32,
}

impl TaskId {
    /// Slot index; tasks run in ascending slot order within a tick.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task{:02}", self.slot)
    }
}

/// Lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Free,
    Registered,
    Running,
    Ended,
}

/// Snapshot of a live task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub state: TaskState,
    pub owner: i32,
    pub priority: i32,
    pub period_ns: u64,
    pub ratio: u64,
    pub stack_size: usize,
    pub resumptions: u64,
}

pub(crate) struct TaskSlot {
    generation: u32,
    pub(crate) state: TaskState,
    owner: i32,
    priority: i32,
    pub(crate) period_ns: u64,
    pub(crate) ratio: u64,
    stack_size: usize,
    entry: Option<TaskEntry>,
    continuation: Option<Box<dyn Continuation>>,
    pub(crate) resumptions: u64,
}

impl TaskSlot {
    fn empty() -> Self {
        Self {
            generation: 0,
            state: TaskState::Free,
            owner: 0,
            priority: 0,
            period_ns: 0,
            ratio: 0,
            stack_size: 0,
            entry: None,
            continuation: None,
            resumptions: 0,
        }
    }

    fn vacate(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self::empty();
        self.generation = generation;
    }

    /// Turn the stored entry into a running continuation.
    pub(crate) fn launch(&mut self, period_ns: u64, ratio: u64) -> RtapiResult<()> {
        let entry = self
            .entry
            .take()
            .ok_or(RtapiError::InvalidArgument("task has no entry"))?;
        self.continuation = Some(entry.start());
        self.period_ns = period_ns;
        self.ratio = ratio.max(1);
        self.state = TaskState::Running;
        Ok(())
    }

    /// Resume once if due on `tick`. Returns whether the body ran.
    pub(crate) fn run_if_due(&mut self, id: TaskId, tick: u64) -> Option<Resumption> {
        if self.state != TaskState::Running || tick % self.ratio != 0 {
            return None;
        }
        let continuation = self.continuation.as_mut()?;
        let outcome = {
            let _current = CurrentGuard::enter(id);
            continuation.resume()
        };
        self.resumptions += 1;
        if outcome == Resumption::Finished {
            self.state = TaskState::Ended;
            self.continuation = None;
        }
        Some(outcome)
    }

    fn info(&self) -> TaskInfo {
        TaskInfo {
            state: self.state,
            owner: self.owner,
            priority: self.priority,
            period_ns: self.period_ns,
            ratio: self.ratio,
            stack_size: self.stack_size,
            resumptions: self.resumptions,
        }
    }
}

/// Fixed-size arena of task slots.
pub struct TaskTable {
    slots: Box<[TaskSlot]>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTable {
    /// Table with `RTAPI_MAX_TASKS` free slots.
    pub fn new() -> Self {
        Self {
            slots: (0..RTAPI_MAX_TASKS).map(|_| TaskSlot::empty()).collect(),
        }
    }

    /// Reserve a slot for `entry`.
    ///
    /// # Errors
    /// - `InvalidArgument` for a priority outside the host range or owner 0
    /// - `OutOfSlots` if every slot is taken
    pub fn insert(
        &mut self,
        entry: TaskEntry,
        priority: i32,
        owner: i32,
        stack_size: usize,
    ) -> RtapiResult<TaskId> {
        if !(RTAPI_PRIO_HIGHEST..=RTAPI_PRIO_LOWEST).contains(&priority) {
            return Err(RtapiError::InvalidArgument("priority out of range"));
        }
        if owner == 0 {
            return Err(RtapiError::InvalidArgument("owner id 0 is reserved"));
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.state == TaskState::Free)
            .ok_or(RtapiError::OutOfSlots {
                max: RTAPI_MAX_TASKS,
            })?;

        let s = &mut self.slots[slot];
        s.state = TaskState::Registered;
        s.owner = owner;
        s.priority = priority;
        s.stack_size = if stack_size == 0 {
            RTAPI_DEFAULT_STACK_SIZE
        } else {
            stack_size
        };
        s.entry = Some(entry);
        Ok(TaskId {
            slot: slot as u16,
            generation: s.generation,
        })
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> RtapiResult<&mut TaskSlot> {
        self.slots
            .get_mut(id.slot())
            .filter(|s| s.state != TaskState::Free && s.generation == id.generation)
            .ok_or(RtapiError::InvalidArgument("invalid task handle"))
    }

    /// Free the slot; the continuation is dropped immediately.
    pub fn remove(&mut self, id: TaskId) -> RtapiResult<()> {
        self.get_mut(id)?.vacate();
        Ok(())
    }

    /// Snapshot of a live task.
    pub fn info(&self, id: TaskId) -> RtapiResult<TaskInfo> {
        self.slots
            .get(id.slot())
            .filter(|s| s.state != TaskState::Free && s.generation == id.generation)
            .map(TaskSlot::info)
            .ok_or(RtapiError::InvalidArgument("invalid task handle"))
    }

    /// Live tasks.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.state != TaskState::Free).count()
    }

    /// Whether no task is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots in ascending order with their current ids.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (TaskId, &mut TaskSlot)> {
        self.slots.iter_mut().enumerate().map(|(i, s)| {
            (
                TaskId {
                    slot: i as u16,
                    generation: s.generation,
                },
                s,
            )
        })
    }
}
