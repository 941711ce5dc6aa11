//! Unsafe FreeBSD process management operations with safe wrappers
//!
//! FreeBSD exposes reaper support through `procctl(2)`: acquiring reaper
//! status, listing the reaper's descendants, and signaling all of them in a
//! single call. All unsafe operations are contained within this crate and
//! exposed through safe APIs.
#![cfg(target_os = "freebsd")]

use libc::{c_int, c_uint, c_void, pid_t};

pub use unsafe_unix_process::Errno;

// <sys/procctl.h>
const P_PID: c_int = 0;
const PROC_REAP_ACQUIRE: c_int = 2;
const PROC_REAP_STATUS: c_int = 4;
const PROC_REAP_GETPIDS: c_int = 5;
const PROC_REAP_KILL: c_int = 6;
const PROC_NO_NEW_PRIVS_CTL: c_int = 19;
const PROC_NO_NEW_PRIVS_ENABLE: c_int = 1;
const REAPER_PIDINFO_VALID: c_uint = 0x0000_0001;

#[repr(C)]
#[allow(dead_code)]
struct ReaperStatus {
    rs_flags: c_uint,
    rs_children: c_uint,
    rs_descendants: c_uint,
    rs_reaper: pid_t,
    rs_pid: pid_t,
    rs_pad0: [c_uint; 15],
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct ReaperPidInfo {
    pi_pid: pid_t,
    pi_subtree: pid_t,
    pi_flags: c_uint,
    pi_pad0: [c_uint; 15],
}

#[repr(C)]
#[allow(dead_code)]
struct ReaperPids {
    rp_count: c_uint,
    rp_pad0: [c_uint; 15],
    rp_pids: *mut ReaperPidInfo,
}

#[repr(C)]
#[allow(dead_code)]
struct ReaperKill {
    rk_sig: c_int,
    rk_flags: c_uint,
    rk_subtree: pid_t,
    rk_killed: c_uint,
    rk_fpid: pid_t,
    rk_pad0: [c_uint; 15],
}

extern "C" {
    fn procctl(idtype: c_int, id: i64, cmd: c_int, data: *mut c_void) -> c_int;
}

fn procctl_self<T>(cmd: c_int, data: &mut T) -> Result<(), Errno> {
    let pid = unsafe { libc::getpid() };
    let result = unsafe { procctl(P_PID, i64::from(pid), cmd, data as *mut T as *mut c_void) };

    if result == -1 {
        return Err(Errno::last());
    }

    Ok(())
}

/// Safely make the calling process a reaper for its descendants
pub fn safe_acquire_reaper() -> Result<(), Errno> {
    let pid = unsafe { libc::getpid() };
    let result = unsafe { procctl(P_PID, i64::from(pid), PROC_REAP_ACQUIRE, std::ptr::null_mut()) };

    if result == -1 {
        return Err(Errno::last());
    }

    Ok(())
}

/// Safely set the no-new-privileges control on the calling process
///
/// Safe to call between fork and exec: it neither allocates nor locks.
pub fn safe_set_no_new_privs() -> Result<(), Errno> {
    let mut enable: c_int = PROC_NO_NEW_PRIVS_ENABLE;
    procctl_self(PROC_NO_NEW_PRIVS_CTL, &mut enable)
}

/// Safely list every live descendant of the calling reaper
pub fn safe_reaper_descendants() -> Result<Vec<u32>, Errno> {
    let mut status = ReaperStatus {
        rs_flags: 0,
        rs_children: 0,
        rs_descendants: 0,
        rs_reaper: 0,
        rs_pid: 0,
        rs_pad0: [0; 15],
    };
    procctl_self(PROC_REAP_STATUS, &mut status)?;

    if status.rs_descendants == 0 {
        return Ok(Vec::new());
    }

    let empty = ReaperPidInfo {
        pi_pid: 0,
        pi_subtree: 0,
        pi_flags: 0,
        pi_pad0: [0; 15],
    };
    // Leave room for descendants forked between the two calls
    let mut infos = vec![empty; status.rs_descendants as usize + 16];
    let mut request = ReaperPids {
        rp_count: infos.len() as c_uint,
        rp_pad0: [0; 15],
        rp_pids: infos.as_mut_ptr(),
    };
    procctl_self(PROC_REAP_GETPIDS, &mut request)?;

    Ok(infos
        .iter()
        .filter(|info| info.pi_flags & REAPER_PIDINFO_VALID != 0)
        .map(|info| info.pi_pid as u32)
        .collect())
}

/// Safely send `signal` to every descendant of the calling reaper
///
/// Returns the number of processes the kernel signaled. An empty tree is
/// reported by the kernel as ESRCH and mapped to zero here.
pub fn safe_reaper_kill(signal: c_int) -> Result<u32, Errno> {
    let mut request = ReaperKill {
        rk_sig: signal,
        rk_flags: 0,
        rk_subtree: 0,
        rk_killed: 0,
        rk_fpid: -1,
        rk_pad0: [0; 15],
    };

    match procctl_self(PROC_REAP_KILL, &mut request) {
        Ok(()) => Ok(request.rk_killed),
        Err(errno) if errno.is_no_such_process() => Ok(0),
        Err(errno) => Err(errno),
    }
}
