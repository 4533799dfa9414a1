//! Shared memory segment slot.

use crate::platform::Attachment;
use rtapi::consts::SHMEM_MAGIC;
use rtapi::error::{RtapiError, RtapiResult};

/// One registry slot: a live segment or a free entry.
///
/// A live slot carries [`SHMEM_MAGIC`]; closing the last reference clears
/// it, so a handle that outlived its segment is rejected instead of
/// dereferencing a stale mapping.
#[derive(Debug)]
pub struct SharedSegment {
    /// Validity marker
    pub magic: u32,
    /// Bumped every time the slot is freed
    pub generation: u32,
    /// User key
    pub key: i32,
    /// Provider segment id
    pub os_id: i32,
    /// Mapped size in bytes
    pub size: usize,
    /// Opens minus closes in this process
    pub refcount: u32,
    /// Owned mapping
    pub attachment: Option<Attachment>,
}

impl SharedSegment {
    /// A free slot.
    pub const fn empty() -> Self {
        Self {
            magic: 0,
            generation: 0,
            key: 0,
            os_id: 0,
            size: 0,
            refcount: 0,
            attachment: None,
        }
    }

    /// Whether the slot holds a mapped segment.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.magic == SHMEM_MAGIC
    }

    /// Check that the slot is live and still on `generation`.
    pub fn validate(&self, generation: u32) -> RtapiResult<()> {
        if !self.is_live() || self.generation != generation {
            return Err(RtapiError::InvalidArgument("stale or unknown shmem handle"));
        }
        Ok(())
    }

    /// Fill a free slot with a fresh mapping.
    pub fn occupy(&mut self, key: i32, attachment: Attachment) {
        self.magic = SHMEM_MAGIC;
        self.key = key;
        self.os_id = attachment.os_id;
        self.size = attachment.size;
        self.refcount = 1;
        self.attachment = Some(attachment);
    }

    /// Return the slot to the free state, handing back the mapping.
    pub fn vacate(&mut self) -> Option<Attachment> {
        self.magic = 0;
        self.generation = self.generation.wrapping_add(1);
        self.key = 0;
        self.os_id = 0;
        self.size = 0;
        self.refcount = 0;
        self.attachment.take()
    }
}

impl Default for SharedSegment {
    fn default() -> Self {
        Self::empty()
    }
}
