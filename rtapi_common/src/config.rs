//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load the TOML configuration
//! of the RTAPI runtime and its simulation binary.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rtapi_common::config::{ConfigLoader, ConfigError, RtapiConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = RtapiConfig::load(Path::new("config/rtapi_sim.toml"))?;
//!     config.validate()?;
//!     println!("Base period: {} ns", config.scheduler.base_period_ns);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_BASE_PERIOD_NS, DEFAULT_DRIFT_THRESHOLD_NS, DEFAULT_STASH_CAPACITY,
    MAX_BASE_PERIOD_NS, MIN_BASE_PERIOD_NS, RTAPI_MAX_TASKS, RTAPI_PRIO_HIGHEST,
    RTAPI_PRIO_LOWEST,
};
use crate::level::MsgLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "rtapi-sim-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "rtapi-sim".to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Base tick and schedule recovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base tick period passed to `clock_set_period` [ns].
    pub base_period_ns: u64,
    /// Smallest base period `clock_set_period` accepts [ns].
    pub min_base_period_ns: u64,
    /// Largest base period `clock_set_period` accepts [ns].
    pub max_base_period_ns: u64,
    /// Lateness after which the schedule baseline jumps to "now" [ns].
    pub drift_threshold_ns: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_period_ns: DEFAULT_BASE_PERIOD_NS,
            min_base_period_ns: MIN_BASE_PERIOD_NS,
            max_base_period_ns: MAX_BASE_PERIOD_NS,
            drift_threshold_ns: DEFAULT_DRIFT_THRESHOLD_NS,
        }
    }
}

impl SchedulerConfig {
    /// Validate period bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_base_period_ns == 0 || self.min_base_period_ns > self.max_base_period_ns {
            return Err(ConfigError::ValidationError(format!(
                "base period bounds [{}, {}] are empty",
                self.min_base_period_ns, self.max_base_period_ns
            )));
        }
        if self.base_period_ns < self.min_base_period_ns
            || self.base_period_ns > self.max_base_period_ns
        {
            return Err(ConfigError::ValidationError(format!(
                "base_period_ns {} outside [{}, {}]",
                self.base_period_ns, self.min_base_period_ns, self.max_base_period_ns
            )));
        }
        if self.drift_threshold_ns < self.base_period_ns {
            return Err(ConfigError::ValidationError(
                "drift_threshold_ns must be at least one base period".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deferred message queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    /// Initial `print_msg` threshold.
    pub level: MsgLevel,
    /// Byte capacity of the message stash.
    pub stash_capacity: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            level: MsgLevel::default(),
            stash_capacity: DEFAULT_STASH_CAPACITY,
        }
    }
}

/// One periodic task started by the simulation binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimTaskConfig {
    /// Task name, used in its messages.
    pub name: String,
    /// Requested period [ns].
    pub period_ns: u64,
    /// Task priority.
    #[serde(default)]
    pub priority: i32,
    /// Recorded stack size (0 = default).
    #[serde(default)]
    pub stack_size: usize,
    /// Shared-memory key the task publishes its run counter to.
    #[serde(default)]
    pub shmem_key: Option<i32>,
}

/// Full runtime configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "rtapi-sim"
///
/// [scheduler]
/// base_period_ns = 1000000
///
/// [messages]
/// level = "dbg"
///
/// [[tasks]]
/// name = "servo"
/// period_ns = 1000000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RtapiConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Message queue settings.
    #[serde(default)]
    pub messages: MessageConfig,
    /// Periodic tasks.
    #[serde(default)]
    pub tasks: Vec<SimTaskConfig>,
}

impl RtapiConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.scheduler.validate()?;

        if self.messages.stash_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "stash_capacity cannot be zero".to_string(),
            ));
        }
        if self.tasks.len() > RTAPI_MAX_TASKS {
            return Err(ConfigError::ValidationError(format!(
                "{} tasks configured, table holds {RTAPI_MAX_TASKS}",
                self.tasks.len()
            )));
        }
        for task in &self.tasks {
            if task.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "task name cannot be empty".to_string(),
                ));
            }
            if !(RTAPI_PRIO_HIGHEST..=RTAPI_PRIO_LOWEST).contains(&task.priority) {
                return Err(ConfigError::ValidationError(format!(
                    "task '{}': priority {} outside [{RTAPI_PRIO_HIGHEST}, {RTAPI_PRIO_LOWEST}]",
                    task.name, task.priority
                )));
            }
            if task.shmem_key == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "task '{}': shmem_key 0 is reserved",
                    task.name
                )));
            }
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
