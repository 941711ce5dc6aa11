//! Linux: prctl subreaper plus the procfs children list

use crate::platform::ReaperPlatform;
use crate::{PlatformError, ProcessId};
use unsafe_linux_process::{safe_read_children, safe_set_child_subreaper, safe_set_no_new_privs};
use unsafe_unix_process::{safe_getpid, Errno};

/// Linux reaper platform
///
/// Linux has no bulk "kill my descendants" call, so sweeps enumerate the
/// subreaper's children and signal them one at a time.
#[derive(Debug, Default)]
pub struct LinuxPlatform;

impl ReaperPlatform for LinuxPlatform {
    fn register_subreaper(&self) -> Result<(), PlatformError> {
        safe_set_child_subreaper().map_err(|errno| PlatformError::syscall("prctl", errno))?;
        tracing::debug!("registered as child subreaper");
        Ok(())
    }

    fn restrict_privileges(&self) -> Result<(), Errno> {
        safe_set_no_new_privs()
    }

    fn enumerate_descendants(&self) -> Result<Vec<ProcessId>, PlatformError> {
        // The supervisor is single-threaded, so the main task's list is complete
        let pids = safe_read_children(safe_getpid()).map_err(|error| {
            PlatformError::DescendantsUnavailable {
                details: error.to_string(),
            }
        })?;

        Ok(pids.into_iter().map(ProcessId).collect())
    }
}
