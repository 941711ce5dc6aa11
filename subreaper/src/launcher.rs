//! Launching the supervised command
//!
//! The parent learns synchronously whether exec succeeded. A close-on-exec
//! pipe is created before forking: a successful exec closes the child's write
//! end, so the parent reads end-of-input; a failed exec (or failing to drop
//! privileges first) writes the errno as a single byte before `_exit(111)`.
//!
//! Before exec the child undoes what the supervisor changed about signals:
//! handlers and ignored dispositions go back to default and the mask is
//! emptied, so the command starts as it would from a shell.

use crate::platform::ReaperPlatform;
use crate::signals::SUPERVISION_SIGNALS;
use crate::{ProcessId, SupervisorError, SupervisorOptions, INTERNAL_ERROR_EXIT_CODE};
use std::io;
use std::os::fd::{AsFd, OwnedFd};
use unsafe_unix_process::{
    safe_execvp, safe_exit, safe_fork, safe_pipe_cloexec, safe_read_byte,
    safe_reset_signal_default, safe_set_signal_mask, safe_wait_pid, safe_write_byte, Errno,
    ExecArgs, ForkResult, SignalSet,
};

/// Fork and exec `options.command`, returning the child's pid once exec succeeded
pub fn launch<P: ReaperPlatform>(
    options: &SupervisorOptions,
    platform: &P,
) -> Result<ProcessId, SupervisorError> {
    options.validate()?;

    let launch_failed = |source: io::Error| SupervisorError::LaunchFailed {
        command: options.program().to_string(),
        source,
    };

    // Everything the child needs is prepared here: it must not allocate after fork
    let args = ExecArgs::new(options.command.as_slice())
        .map_err(|error| launch_failed(io::Error::new(io::ErrorKind::InvalidInput, error)))?;
    let child_mask = SignalSet::empty();
    let (status_read, status_write) =
        safe_pipe_cloexec().map_err(|errno| launch_failed(errno.into()))?;

    match safe_fork().map_err(|errno| launch_failed(errno.into()))? {
        ForkResult::Child => {
            drop(status_read);
            exec_child(&args, &child_mask, options.restrict_privileges, platform, status_write)
        }
        ForkResult::Parent { child } => {
            drop(status_write);

            match safe_read_byte(status_read.as_fd()) {
                Ok(None) => Ok(ProcessId(child)),
                Ok(Some(byte)) => {
                    // The child has already called _exit; collect it before reporting
                    if let Err(errno) = safe_wait_pid(child) {
                        tracing::debug!(pid = child, "could not reap failed child: {}", errno);
                    }
                    Err(launch_failed(io::Error::from_raw_os_error(i32::from(byte))))
                }
                Err(errno) => {
                    tracing::warn!(pid = child, "could not read exec status: {}", errno);
                    Ok(ProcessId(child))
                }
            }
        }
    }
}

fn exec_child<P: ReaperPlatform>(
    args: &ExecArgs,
    mask: &SignalSet,
    restrict_privileges: bool,
    platform: &P,
    status_write: OwnedFd,
) -> ! {
    // The Rust runtime ignores SIGPIPE, and ignored signals survive exec
    for signal in std::iter::once(libc::SIGPIPE).chain(SUPERVISION_SIGNALS) {
        if let Err(errno) = safe_reset_signal_default(signal) {
            report_and_exit(&status_write, errno);
        }
    }
    if let Err(errno) = safe_set_signal_mask(mask) {
        report_and_exit(&status_write, errno);
    }

    if restrict_privileges {
        if let Err(errno) = platform.restrict_privileges() {
            report_and_exit(&status_write, errno);
        }
    }

    let errno = safe_execvp(args);
    report_and_exit(&status_write, errno)
}

fn report_and_exit(status_write: &OwnedFd, errno: Errno) -> ! {
    safe_write_byte(status_write.as_fd(), errno.0.clamp(1, 255) as u8);
    safe_exit(INTERNAL_ERROR_EXIT_CODE)
}
