//! Prelude module for common re-exports.
//!
//! ```rust
//! use rtapi_common::prelude::*;
//! ```

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{RtapiError, RtapiResult};

// ─── Messages ───────────────────────────────────────────────────────
pub use crate::level::MsgLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, LogLevel, MessageConfig, RtapiConfig, SchedulerConfig,
    SharedConfig, SimTaskConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    RTAPI_MAX_SHMEMS, RTAPI_MAX_TASKS, RTAPI_PRIO_HIGHEST, RTAPI_PRIO_LOWEST,
};
