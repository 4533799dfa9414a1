//! System V IPC shared memory (`shmget`/`shmat`/`shmdt`/`shmctl`).

use super::{Attachment, SegmentProvider};
use nix::errno::Errno;
use rtapi::error::{RtapiError, RtapiResult};
use std::ptr::NonNull;

/// Permissions for newly created segments.
const SHM_PERMISSIONS: libc::c_int = 0o666;

/// Segments shared across processes by SysV key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysvProvider;

impl SysvProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }

    /// Query the kernel's view of a segment.
    fn stat(os_id: i32) -> RtapiResult<libc::shmid_ds> {
        // SAFETY: shmid_ds is plain data; IPC_STAT fills it completely.
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::shmctl(os_id, libc::IPC_STAT, &mut ds) };
        if ret < 0 {
            return Err(Errno::last().into());
        }
        Ok(ds)
    }

    /// Remove the segment if nothing is attached to it any more.
    ///
    /// Returns whether it was removed.
    fn remove_if_unattached(os_id: i32) -> RtapiResult<bool> {
        let ds = match Self::stat(os_id) {
            Ok(ds) => ds,
            // Already removed by someone else.
            Err(_) => return Ok(false),
        };
        if ds.shm_nattch != 0 {
            return Ok(false);
        }

        let ret = unsafe { libc::shmctl(os_id, libc::IPC_RMID, std::ptr::null_mut()) };
        if ret < 0 {
            return Err(Errno::last().into());
        }
        Ok(true)
    }
}

impl SegmentProvider for SysvProvider {
    fn attach(&mut self, key: i32, size: usize) -> RtapiResult<Attachment> {
        let os_id = unsafe {
            libc::shmget(
                key as libc::key_t,
                size as libc::size_t,
                libc::IPC_CREAT | SHM_PERMISSIONS,
            )
        };
        if os_id < 0 {
            return Err(match Errno::last() {
                Errno::EINVAL => RtapiError::InvalidArgument("segment size mismatch for key"),
                Errno::ENOMEM | Errno::ENOSPC => RtapiError::OutOfMemory("shmget"),
                errno => errno.into(),
            });
        }

        let addr = unsafe { libc::shmat(os_id, std::ptr::null(), 0) };
        if addr as isize == -1 {
            let errno = Errno::last();
            // Do not leak a segment this call may just have created.
            let _ = Self::remove_if_unattached(os_id);
            return Err(match errno {
                Errno::ENOMEM => RtapiError::OutOfMemory("shmat"),
                errno => errno.into(),
            });
        }
        let ptr = NonNull::new(addr.cast::<u8>()).ok_or(RtapiError::OutOfMemory("shmat"))?;

        let segsz = Self::stat(os_id)
            .map(|ds| ds.shm_segsz as usize)
            .unwrap_or(size);

        Ok(Attachment {
            os_id,
            ptr,
            size: segsz,
        })
    }

    fn release(&mut self, attachment: Attachment) -> RtapiResult<bool> {
        let ret = unsafe { libc::shmdt(attachment.ptr.as_ptr().cast::<libc::c_void>()) };
        if ret < 0 {
            return Err(Errno::last().into());
        }

        // Another process may still be attached; only the last one out removes it.
        Self::remove_if_unattached(attachment.os_id)
    }
}
