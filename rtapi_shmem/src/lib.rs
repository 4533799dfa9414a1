//! # RTAPI Shared Memory Registry
//!
//! Maps small integer keys to OS shared-memory segments. A key is opened
//! once per process and reference counted: every further `open` of the
//! same key returns the same handle, and the mapping is only torn down by
//! the matching number of `close` calls.
//!
//! ## Usage
//!
//! ```rust
//! use rtapi_shmem::{HeapProvider, ShmemRegistry};
//!
//! # fn main() -> rtapi::error::RtapiResult<()> {
//! let mut registry = ShmemRegistry::new(HeapProvider::new());
//! let id = registry.open(0x4242, 4096)?;
//! let again = registry.open(0x4242, 4096)?;
//! assert_eq!(id, again);
//!
//! let ptr = registry.get_ptr(id)?;
//! unsafe { ptr.write(7) };
//!
//! registry.close(again)?;
//! registry.close(id)?;
//! assert!(registry.get_ptr(id).is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - [`SysvProvider`]: System V IPC (`shmget`/`shmat`), visible to other
//!   processes using the same key. A segment is removed on last close only
//!   if no other process is still attached.
//! - [`HeapProvider`]: process-local zeroed allocations with the same
//!   attach-count semantics, for tests and hosts without SysV IPC.
//!
//! ## Thread Safety
//!
//! The registry is not synchronised. It must only be mutated from the
//! single scheduling thread, between task resumptions.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod platform;
pub mod registry;
pub mod segment;

pub use platform::{Attachment, HeapProvider, SegmentProvider, SysvProvider};
pub use registry::{ShmemId, ShmemRegistry};
pub use segment::SharedSegment;
