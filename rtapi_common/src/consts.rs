//! System-wide constants for the RTAPI workspace.
//!
//! Single source of truth for all numeric limits and default paths.
//! Imported by all crates, no duplication permitted.

use static_assertions::const_assert;

/// Maximum number of task slots in the task table.
pub const RTAPI_MAX_TASKS: usize = 64;

/// Maximum number of shared-memory segments open at once.
pub const RTAPI_MAX_SHMEMS: usize = 32;

/// Highest task priority (numerically lowest).
pub const RTAPI_PRIO_HIGHEST: i32 = 0;

/// Lowest task priority (numerically highest).
pub const RTAPI_PRIO_LOWEST: i32 = 31;

/// Stack size recorded for a task created with `stack_size == 0`.
pub const RTAPI_DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Marker stored in a live shared-memory slot.
pub const SHMEM_MAGIC: u32 = 0x5348_4d45; // "SHME"

/// Default base tick period [ns] (1 kHz).
pub const DEFAULT_BASE_PERIOD_NS: u64 = 1_000_000;

/// Smallest accepted base period [ns].
pub const MIN_BASE_PERIOD_NS: u64 = 2_000;

/// Largest accepted base period [ns].
pub const MAX_BASE_PERIOD_NS: u64 = 1_000_000_000;

/// Lateness beyond which the scheduler rebases on "now" instead of catching up [ns].
pub const DEFAULT_DRIFT_THRESHOLD_NS: u64 = 100_000_000;

/// Default capacity of the deferred message queue [bytes].
pub const DEFAULT_STASH_CAPACITY: usize = 8 * 1024;

/// Default configuration file for the `rtapi_sim` binary.
pub const DEFAULT_CONFIG_PATH: &str = "config/rtapi_sim.toml";

const_assert!(RTAPI_PRIO_HIGHEST < RTAPI_PRIO_LOWEST);
const_assert!(MIN_BASE_PERIOD_NS <= DEFAULT_BASE_PERIOD_NS);
const_assert!(DEFAULT_BASE_PERIOD_NS <= MAX_BASE_PERIOD_NS);
const_assert!(RTAPI_MAX_TASKS <= u16::MAX as usize);
