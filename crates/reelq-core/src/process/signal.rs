//! Liveness checks and group termination for worker pids.
//!
//! Workers run in their own process group, so terminating the group also
//! stops the download tool the worker started.

use std::io;

/// Result of asking a worker to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Signalled,
    /// No such process (`ESRCH`); it already exited.
    AlreadyGone,
}

#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Send `SIGTERM` to the process group led by `pid`.
#[cfg(unix)]
pub fn terminate_group(pid: u32) -> io::Result<Termination> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: plain syscalls on integer ids.
    let pgid = unsafe { libc::getpgid(pid) };
    if pgid < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(Termination::AlreadyGone);
        }
        return Err(err);
    }

    // Workers lead their own group. A pid that does not was reused by
    // something else, and its group is not ours to stop.
    if pgid != pid {
        tracing::warn!(pid, pgid, "pid is not a worker group leader, not signalling");
        return Ok(Termination::AlreadyGone);
    }
    let own = unsafe { libc::getpgrp() };
    if pgid == own {
        tracing::warn!(pid, "pid leads our own process group, not signalling");
        return Ok(Termination::AlreadyGone);
    }

    let rc = unsafe { libc::killpg(pgid, libc::SIGTERM) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(Termination::AlreadyGone);
        }
        return Err(err);
    }
    Ok(Termination::Signalled)
}

/// Send `SIGKILL` to the whole process group led by `pgid`.
#[cfg(unix)]
pub fn kill_group(pgid: u32) -> io::Result<Termination> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
    if pgid <= 1 || pgid == unsafe { libc::getpgrp() } {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "refusing to kill own group"));
    }
    // SAFETY: plain syscall on an integer id.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(Termination::AlreadyGone);
        }
        return Err(err);
    }
    Ok(Termination::Signalled)
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn terminate_group(_pid: u32) -> io::Result<Termination> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are only supported on unix",
    ))
}

#[cfg(not(unix))]
pub fn kill_group(_pgid: u32) -> io::Result<Termination> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are only supported on unix",
    ))
}
