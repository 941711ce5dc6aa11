//! Platform abstraction layer for subreaper supervision
//!
//! Everything operating-system specific sits behind [`ReaperPlatform`]. The
//! supervision loop and escalation logic stay portable.

use crate::{EscalationLevel, PlatformError, ProcessId};
use unsafe_unix_process::Errno;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "freebsd")]
mod freebsd;

#[cfg(test)]
pub(crate) mod fake;

/// Signal used by a kill sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forceful,
}

impl KillSignal {
    /// Signal matching an escalation level; `None` when nothing should be sent
    pub fn for_level(level: EscalationLevel) -> Option<Self> {
        match level {
            EscalationLevel::None => None,
            EscalationLevel::Graceful => Some(KillSignal::Graceful),
            EscalationLevel::Forceful => Some(KillSignal::Forceful),
        }
    }

    pub fn as_raw(self) -> libc::c_int {
        match self {
            KillSignal::Graceful => libc::SIGTERM,
            KillSignal::Forceful => libc::SIGKILL,
        }
    }
}

/// Kernel facilities a subreaper relies on
pub trait ReaperPlatform {
    /// Make the calling process the reaper of its future orphaned descendants
    fn register_subreaper(&self) -> Result<(), PlatformError>;

    /// Deny privilege elevation across exec for the calling process
    ///
    /// Runs in the forked child before exec: it must not allocate or lock.
    fn restrict_privileges(&self) -> Result<(), Errno>;

    /// Descendants currently attached to this reaper
    fn enumerate_descendants(&self) -> Result<Vec<ProcessId>, PlatformError>;

    /// Deliver `signal` to a single process
    fn signal_process(&self, pid: ProcessId, signal: KillSignal) -> Result<(), Errno> {
        unsafe_unix_process::safe_kill(pid.0, signal.as_raw())
    }

    /// Signal every descendant in one kernel call
    ///
    /// Returns `Ok(None)` when the platform has no such primitive and the
    /// caller has to enumerate and signal one by one.
    fn signal_all_descendants(&self, _signal: KillSignal) -> Result<Option<usize>, PlatformError> {
        Ok(None)
    }
}

/// Fallback for systems without subreaper support; registration always fails
#[derive(Debug, Default)]
pub struct UnsupportedPlatform;

impl ReaperPlatform for UnsupportedPlatform {
    fn register_subreaper(&self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "subreaper registration",
        })
    }

    fn restrict_privileges(&self) -> Result<(), Errno> {
        Err(Errno(libc::ENOSYS))
    }

    fn enumerate_descendants(&self) -> Result<Vec<ProcessId>, PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "descendant enumeration",
        })
    }
}

// Platform-specific concrete type (compile-time selected)
#[cfg(target_os = "linux")]
pub type ConcretePlatform = linux::LinuxPlatform;

#[cfg(target_os = "freebsd")]
pub type ConcretePlatform = freebsd::FreeBsdPlatform;

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
pub type ConcretePlatform = UnsupportedPlatform;

/// Create the reaper platform for the current system
pub fn create_platform() -> ConcretePlatform {
    ConcretePlatform::default()
}
