//! Process-local segments with SysV-like attach counting.

use super::{Attachment, SegmentProvider};
use rtapi::error::{RtapiError, RtapiResult};
use std::collections::HashMap;
use std::ptr::NonNull;

struct HeapSegment {
    os_id: i32,
    // u64 words keep the region 8-byte aligned.
    storage: Box<[u64]>,
    size: usize,
    attachments: u32,
}

/// Zeroed heap allocations keyed like SysV segments.
///
/// [`attach_external`](Self::attach_external) stands in for another
/// process holding the segment, so removal-on-last-detach can be exercised
/// without a second process.
#[derive(Default)]
pub struct HeapProvider {
    segments: HashMap<i32, HeapSegment>,
    next_os_id: i32,
}

impl HeapProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a segment exists for `key`.
    pub fn contains(&self, key: i32) -> bool {
        self.segments.contains_key(&key)
    }

    /// Current attachment count for `key`.
    pub fn attachments(&self, key: i32) -> Option<u32> {
        self.segments.get(&key).map(|s| s.attachments)
    }

    /// Register an attachment that does not belong to the registry.
    pub fn attach_external(&mut self, key: i32) -> RtapiResult<()> {
        let seg = self
            .segments
            .get_mut(&key)
            .ok_or(RtapiError::InvalidArgument("no segment for key"))?;
        seg.attachments += 1;
        Ok(())
    }

    /// Drop an external attachment, removing the segment if it was the last.
    pub fn detach_external(&mut self, key: i32) -> RtapiResult<()> {
        let seg = self
            .segments
            .get_mut(&key)
            .ok_or(RtapiError::InvalidArgument("no segment for key"))?;
        seg.attachments = seg.attachments.saturating_sub(1);
        if seg.attachments == 0 {
            self.segments.remove(&key);
        }
        Ok(())
    }
}

impl SegmentProvider for HeapProvider {
    fn attach(&mut self, key: i32, size: usize) -> RtapiResult<Attachment> {
        if !self.segments.contains_key(&key) {
            if size == 0 {
                return Err(RtapiError::InvalidArgument("segment size mismatch for key"));
            }
            self.next_os_id += 1;
            let words = size.div_ceil(std::mem::size_of::<u64>());
            self.segments.insert(
                key,
                HeapSegment {
                    os_id: self.next_os_id,
                    storage: vec![0u64; words].into_boxed_slice(),
                    size,
                    attachments: 0,
                },
            );
        }

        let seg = self
            .segments
            .get_mut(&key)
            .ok_or(RtapiError::OutOfMemory("heap segment"))?;
        if seg.size < size {
            return Err(RtapiError::InvalidArgument("segment size mismatch for key"));
        }
        seg.attachments += 1;

        let ptr = NonNull::new(seg.storage.as_mut_ptr().cast::<u8>())
            .ok_or(RtapiError::OutOfMemory("heap segment"))?;
        Ok(Attachment {
            os_id: seg.os_id,
            ptr,
            size: seg.size,
        })
    }

    fn release(&mut self, attachment: Attachment) -> RtapiResult<bool> {
        let key = self
            .segments
            .iter()
            .find(|(_, s)| s.os_id == attachment.os_id)
            .map(|(k, _)| *k)
            .ok_or(RtapiError::InvalidArgument("unknown segment"))?;

        let seg = self
            .segments
            .get_mut(&key)
            .ok_or(RtapiError::InvalidArgument("unknown segment"))?;
        seg.attachments = seg.attachments.saturating_sub(1);
        if seg.attachments > 0 {
            return Ok(false);
        }
        self.segments.remove(&key);
        Ok(true)
    }
}
