//! Key-addressed registry of reference-counted segments.

use crate::platform::{SegmentProvider, SysvProvider};
use crate::segment::SharedSegment;
use rtapi::consts::RTAPI_MAX_SHMEMS;
use rtapi::error::{RtapiError, RtapiResult};
use tracing::debug;

/// Handle to an open segment.
///
/// Carries the slot generation so that a handle kept past its final
/// `close` is rejected even after the slot is reused for another key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShmemId {
    slot: u16,
    generation: u32,
}

impl ShmemId {
    /// Slot index in the registry table.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

impl std::fmt::Display for ShmemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shmem{:02}", self.slot)
    }
}

/// Fixed-size table of shared-memory segments.
pub struct ShmemRegistry<P: SegmentProvider = SysvProvider> {
    provider: P,
    slots: [SharedSegment; RTAPI_MAX_SHMEMS],
    /// key -> slot for live segments
    index: heapless::Vec<(i32, u16), RTAPI_MAX_SHMEMS>,
}

impl<P: SegmentProvider> ShmemRegistry<P> {
    /// Create an empty registry backed by `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            slots: core::array::from_fn(|_| SharedSegment::empty()),
            index: heapless::Vec::new(),
        }
    }

    /// Open the segment for `key`, creating it with `size` bytes if needed.
    ///
    /// Re-opening a key returns the same handle and bumps its refcount.
    ///
    /// # Errors
    /// - `InvalidArgument` for key 0, or if the existing segment is smaller than `size`
    /// - `OutOfMemory` if the table is full or the OS refuses the allocation
    pub fn open(&mut self, key: i32, size: usize) -> RtapiResult<ShmemId> {
        if key == 0 {
            return Err(RtapiError::InvalidArgument("shmem key 0 is reserved"));
        }

        if let Some(slot) = self.lookup(key) {
            let seg = &mut self.slots[slot];
            if seg.size < size {
                return Err(RtapiError::InvalidArgument(
                    "existing segment smaller than requested",
                ));
            }
            seg.refcount += 1;
            debug!(
                "shmem {:02} opened again, key: {:#x}, refcount: {}",
                slot, key, seg.refcount
            );
            return Ok(ShmemId {
                slot: slot as u16,
                generation: seg.generation,
            });
        }

        let slot = self
            .slots
            .iter()
            .position(|s| !s.is_live())
            .ok_or(RtapiError::OutOfMemory("shmem table full"))?;

        let attachment = self.provider.attach(key, size)?;
        self.index
            .push((key, slot as u16))
            .map_err(|_| RtapiError::OutOfMemory("shmem table full"))?;

        let seg = &mut self.slots[slot];
        seg.occupy(key, attachment);
        debug!(
            "shmem {:02} created, key: {:#x}, size: {}, os_id: {}",
            slot, key, seg.size, seg.os_id
        );

        Ok(ShmemId {
            slot: slot as u16,
            generation: seg.generation,
        })
    }

    /// Address of the mapped region.
    pub fn get_ptr(&self, id: ShmemId) -> RtapiResult<*mut u8> {
        let seg = self.segment(id)?;
        seg.attachment
            .as_ref()
            .map(|a| a.ptr.as_ptr())
            .ok_or(RtapiError::InvalidArgument("segment not mapped"))
    }

    /// Drop one reference; the last one unmaps the segment.
    pub fn close(&mut self, id: ShmemId) -> RtapiResult<()> {
        let seg = self.segment_mut(id)?;
        seg.refcount -= 1;
        if seg.refcount > 0 {
            debug!(
                "shmem {:02} closed, refcount: {}",
                id.slot, seg.refcount
            );
            return Ok(());
        }

        let key = seg.key;
        let attachment = seg.vacate();
        if let Some(pos) = self.index.iter().position(|(k, _)| *k == key) {
            self.index.swap_remove(pos);
        }

        if let Some(attachment) = attachment {
            let removed = self.provider.release(attachment)?;
            debug!(
                "shmem {:02} unmapped, key: {:#x}, removed: {}",
                id.slot, key, removed
            );
        }
        Ok(())
    }

    /// Mapped size of an open segment.
    pub fn size(&self, id: ShmemId) -> RtapiResult<usize> {
        Ok(self.segment(id)?.size)
    }

    /// Current reference count of an open segment.
    pub fn refcount(&self, id: ShmemId) -> RtapiResult<u32> {
        Ok(self.segment(id)?.refcount)
    }

    /// Handle of the open segment for `key`, if any.
    pub fn find(&self, key: i32) -> Option<ShmemId> {
        self.lookup(key).map(|slot| ShmemId {
            slot: slot as u16,
            generation: self.slots[slot].generation,
        })
    }

    /// Number of open segments.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no segment is open.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Backing provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Backing provider, mutable.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    fn lookup(&self, key: i32) -> Option<usize> {
        self.index
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, slot)| *slot as usize)
    }

    fn segment(&self, id: ShmemId) -> RtapiResult<&SharedSegment> {
        let seg = self
            .slots
            .get(id.slot())
            .ok_or(RtapiError::InvalidArgument("shmem handle out of range"))?;
        seg.validate(id.generation)?;
        Ok(seg)
    }

    fn segment_mut(&mut self, id: ShmemId) -> RtapiResult<&mut SharedSegment> {
        let seg = self
            .slots
            .get_mut(id.slot())
            .ok_or(RtapiError::InvalidArgument("shmem handle out of range"))?;
        seg.validate(id.generation)?;
        Ok(seg)
    }
}

impl<P: SegmentProvider> Drop for ShmemRegistry<P> {
    fn drop(&mut self) {
        for seg in self.slots.iter_mut().filter(|s| s.is_live()) {
            if let Some(attachment) = seg.vacate() {
                let _ = self.provider.release(attachment);
            }
        }
    }
}
