//! RTAPI Common Library
//!
//! This crate provides the constants, error taxonomy, message levels and
//! configuration loading utilities shared by all RTAPI workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Table sizes, priority range, timing limits
//! - [`error`] - `RtapiError` status codes returned by every operation
//! - [`level`] - Message verbosity levels for `print_msg`
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rtapi_common::prelude::*;
//!
//! fn check(prio: i32) -> RtapiResult<()> {
//!     if prio < RTAPI_PRIO_HIGHEST || prio > RTAPI_PRIO_LOWEST {
//!         return Err(RtapiError::InvalidArgument("priority out of range"));
//!     }
//!     Ok(())
//! }
//! # assert!(check(0).is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod level;
pub mod prelude;
