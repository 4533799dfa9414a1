//! Process setup for real-time runs.
//!
//! With the `rt` feature, [`rt_setup`] locks memory, pins the scheduling
//! thread to one core and switches it to `SCHED_FIFO`. Without it every
//! step except stack prefaulting is a no-op, so simulation runs need no
//! privileges.

use rtapi_common::error::RtapiResult;

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> RtapiResult<()> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> RtapiResult<()> {
    Ok(())
}

/// Touch the scheduler's stack so the first ticks do not page-fault.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to `cpu`.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> RtapiResult<()> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset.set(cpu)?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> RtapiResult<()> {
    Ok(())
}

/// `SCHED_FIFO` at `priority`.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> RtapiResult<()> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> RtapiResult<()> {
    Ok(())
}

/// Prepare the calling thread to drive the scheduler.
///
/// Call once, before the first tick.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> RtapiResult<()> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

/// Whether the crate was built with the `rt` feature.
pub const fn rt_enabled() -> bool {
    cfg!(feature = "rt")
}
