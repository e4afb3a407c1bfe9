//! File descriptor limit detection for capping pool widths (Unix).

/// Descriptors one running merge task may hold at once: the source being read, the scratch file
/// being appended to, and one directory handle per level of the walk over its sources.
pub const FDS_PER_TASK: usize = 16;

/// Fraction of the process FD limit to use (leave headroom for other code).
const FD_LIMIT_FRACTION: f64 = 0.8;

/// Returns the soft limit for max open file descriptors, or `None` if unavailable (e.g. Windows).
#[cfg(unix)]
pub fn max_open_fds() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let rlim = unsafe { rlim.assume_init() };
    let cur = rlim.rlim_cur;
    // RLIM_INFINITY is typically !0 or u64::MAX; treat as "no practical limit"
    if cur == libc::RLIM_INFINITY || cur > i64::MAX as u64 {
        return None;
    }
    Some(cur)
}

#[cfg(not(unix))]
pub fn max_open_fds() -> Option<u64> {
    None
}

/// Most tasks that may run side by side while keeping ~80% of the FD limit in use.
/// `None` when the platform reports no limit.
pub fn max_workers_by_fd_limit() -> Option<usize> {
    let limit = max_open_fds()?;
    let usable = (limit as f64 * FD_LIMIT_FRACTION) as usize;
    if usable < FDS_PER_TASK {
        return Some(1);
    }
    Some(usable / FDS_PER_TASK)
}

/// Clamp a requested worker count to `[1, work_items]` and under the FD cap.
pub fn cap_workers(requested: usize, work_items: usize) -> usize {
    let mut n = requested.max(1);
    if let Some(fd_cap) = max_workers_by_fd_limit()
        && fd_cap < n
    {
        log::debug!("Capping workers {} -> {} (FD limit ~80%)", n, fd_cap);
        n = fd_cap;
    }
    n.min(work_items.max(1))
}
