//! FreeBSD: procctl reaper with a bulk kill primitive

use crate::platform::{KillSignal, ReaperPlatform};
use crate::{PlatformError, ProcessId};
use unsafe_freebsd_process::{
    safe_acquire_reaper, safe_reaper_descendants, safe_reaper_kill, safe_set_no_new_privs,
};
use unsafe_unix_process::Errno;

/// FreeBSD reaper platform
#[derive(Debug, Default)]
pub struct FreeBsdPlatform;

impl ReaperPlatform for FreeBsdPlatform {
    fn register_subreaper(&self) -> Result<(), PlatformError> {
        safe_acquire_reaper()
            .map_err(|errno| PlatformError::syscall("procctl(PROC_REAP_ACQUIRE)", errno))?;
        tracing::debug!("acquired reaper status");
        Ok(())
    }

    fn restrict_privileges(&self) -> Result<(), Errno> {
        safe_set_no_new_privs()
    }

    fn enumerate_descendants(&self) -> Result<Vec<ProcessId>, PlatformError> {
        let pids = safe_reaper_descendants()
            .map_err(|errno| PlatformError::syscall("procctl(PROC_REAP_GETPIDS)", errno))?;
        Ok(pids.into_iter().map(ProcessId).collect())
    }

    fn signal_all_descendants(&self, signal: KillSignal) -> Result<Option<usize>, PlatformError> {
        let killed = safe_reaper_kill(signal.as_raw())
            .map_err(|errno| PlatformError::syscall("procctl(PROC_REAP_KILL)", errno))?;
        Ok(Some(killed as usize))
    }
}
