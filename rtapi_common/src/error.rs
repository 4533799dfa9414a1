//! Error taxonomy shared by every RTAPI operation.
//!
//! Status codes are returned, never raised: the caller's context decides
//! whether an error is fatal.

use thiserror::Error;

/// Errors returned by RTAPI operations.
#[derive(Error, Debug)]
pub enum RtapiError {
    /// Bad handle, out-of-range priority, wrong state for the operation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Task table exhausted.
    #[error("No free task slot (table holds {max})")]
    OutOfSlots {
        /// Table capacity
        max: usize,
    },

    /// Shared-memory table exhausted or the OS refused the allocation.
    #[error("Out of memory: {0}")]
    OutOfMemory(&'static str),

    /// Buffer write would exceed capacity.
    #[error("Buffer out of space: need {needed} bytes, {remaining} remaining")]
    OutOfSpace {
        /// Bytes the write requires
        needed: usize,
        /// Bytes left before capacity
        remaining: usize,
    },

    /// Buffer read found insufficient data (e.g. an unterminated string).
    #[error("Incomplete data in buffer")]
    WouldBlock,

    /// Unknown or malformed conversion in a format string, or an argument
    /// whose type does not match its conversion.
    #[error("Invalid format at byte {offset}: {reason}")]
    InvalidFormat {
        /// Byte offset into the format string
        offset: usize,
        /// What went wrong
        reason: &'static str,
    },

    /// The host cannot perform this operation.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// System call error
    #[error("System call error: {source}")]
    Os {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for RTAPI operations
pub type RtapiResult<T> = Result<T, RtapiError>;
