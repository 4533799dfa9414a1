//! OS-facing segment providers.

mod heap;
mod sysv;

pub use heap::HeapProvider;
pub use sysv::SysvProvider;

use rtapi::error::RtapiResult;
use std::ptr::NonNull;

/// A segment mapped into this process.
#[derive(Debug)]
pub struct Attachment {
    /// Provider-specific segment identifier (the SysV shmid).
    pub os_id: i32,
    /// Start of the mapped region.
    pub ptr: NonNull<u8>,
    /// Size of the region in bytes.
    pub size: usize,
}

/// Source of shared-memory segments for the registry.
pub trait SegmentProvider {
    /// Create the segment for `key` or attach to the existing one.
    ///
    /// Fails with `InvalidArgument` if an existing segment is smaller than
    /// `size`, and with `OutOfMemory` if the OS refuses the allocation.
    fn attach(&mut self, key: i32, size: usize) -> RtapiResult<Attachment>;

    /// Unmap this process's attachment and remove the segment if no other
    /// attachment remains.
    ///
    /// Returns `true` if the segment was removed.
    fn release(&mut self, attachment: Attachment) -> RtapiResult<bool>;
}
