//! Unsafe Linux process management operations with safe wrappers
//!
//! This crate provides safe wrappers around the Linux-only pieces of subreaper
//! supervision: `prctl` based subreaper registration and privilege restriction,
//! and reading the kernel's per-task children list from procfs.
//! All unsafe operations are contained within this crate and exposed through safe APIs.
#![cfg(target_os = "linux")]

use std::path::PathBuf;

pub use unsafe_unix_process::Errno;

/// Errors that can occur while reading the procfs children list
#[derive(Debug, thiserror::Error)]
pub enum UnsafeLinuxError {
    #[error("could not open {}: {source}", path.display())]
    ChildrenListUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("weird byte in /children: {byte:#04x}")]
    MalformedChildrenList { byte: u8 },
}

/// Safely register the calling process as a child subreaper
///
/// Orphaned descendants are re-parented to this process instead of init.
pub fn safe_set_child_subreaper() -> Result<(), Errno> {
    // SAFETY: PR_SET_CHILD_SUBREAPER takes a plain integer flag
    let result = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1 as libc::c_ulong) };

    if result != 0 {
        return Err(Errno::last());
    }

    Ok(())
}

/// Safely set the no_new_privs bit on the calling thread
///
/// Safe to call between fork and exec: it neither allocates nor locks.
pub fn safe_set_no_new_privs() -> Result<(), Errno> {
    // SAFETY: PR_SET_NO_NEW_PRIVS requires the unused arguments to be zero
    let result = unsafe {
        libc::prctl(
            libc::PR_SET_NO_NEW_PRIVS,
            1 as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
        )
    };

    if result != 0 {
        return Err(Errno::last());
    }

    Ok(())
}

/// Path of the children list for the main thread of `pid`
///
/// Needs CONFIG_PROC_CHILDREN (Linux 4.2+).
pub fn children_list_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/task/{pid}/children"))
}

/// Safely read the direct children of `pid` as tracked by the kernel
///
/// For a subreaper this includes every re-parented orphan.
pub fn safe_read_children(pid: u32) -> Result<Vec<u32>, UnsafeLinuxError> {
    let path = children_list_path(pid);
    let contents = std::fs::read(&path)
        .map_err(|source| UnsafeLinuxError::ChildrenListUnavailable { path, source })?;

    parse_children_list(&contents)
}

/// Parse a procfs children list: decimal pids separated by spaces
pub fn parse_children_list(contents: &[u8]) -> Result<Vec<u32>, UnsafeLinuxError> {
    let mut pids = Vec::new();
    let mut current: Option<u32> = None;

    for &byte in contents {
        match byte {
            b'0'..=b'9' => {
                let digit = u32::from(byte - b'0');
                current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
            }
            b' ' | b'\n' => {
                if let Some(pid) = current.take() {
                    pids.push(pid);
                }
            }
            other => return Err(UnsafeLinuxError::MalformedChildrenList { byte: other }),
        }
    }

    if let Some(pid) = current {
        pids.push(pid);
    }

    Ok(pids)
}
