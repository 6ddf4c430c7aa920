//! Background worker scheduling priority.

/// Nice increment applied to rebuild workers.
#[cfg(target_os = "linux")]
const BACKGROUND_NICE: libc::c_int = 10;

/// Lower the scheduling priority of the calling thread.
///
/// On Linux the nice value is per thread, so `who = 0` only touches the
/// worker. Failure is logged and otherwise ignored.
#[cfg(target_os = "linux")]
pub(crate) fn lower_current_thread() {
    use kiln_config::log_rebuild_debug;

    // SAFETY: plain syscall on the calling thread, no pointers involved.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, BACKGROUND_NICE) };
    if rc != 0 {
        log_rebuild_debug!(
            "Could not lower worker priority",
            error = display(std::io::Error::last_os_error())
        );
    }
}

/// Elsewhere `setpriority` applies to the whole process; leave it alone.
#[cfg(not(target_os = "linux"))]
pub(crate) fn lower_current_thread() {}
