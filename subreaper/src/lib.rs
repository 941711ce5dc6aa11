//! Subreaper - run a command and make sure none of its descendants outlive it
//!
//! The supervisor registers itself as a child subreaper, launches a single
//! command, reaps every process that gets re-parented to it, and on shutdown
//! sweeps the remaining process tree: first with SIGTERM, then, if asked
//! again, with SIGKILL.

use std::fmt;

// Core modules
pub mod error;
pub mod escalation;
pub mod events;
pub mod launcher;
pub mod platform;
pub mod reaper;
pub mod signals;
pub mod terminator;

// Re-export core types
pub use error::{PlatformError, SupervisorError};
pub use escalation::{EscalationLevel, EscalationState};
pub use events::SupervisorEvent;
pub use platform::{create_platform, ConcretePlatform, KillSignal, ReaperPlatform};
pub use reaper::{LoopControl, Supervision, Supervisor, WaitOutcome};
pub use terminator::Terminator;

/// Exit code reserved for failures of the supervisor itself
pub const INTERNAL_ERROR_EXIT_CODE: i32 = 111;

/// Kernel process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complete specification of one supervised run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Keep waiting for the whole tree to exit on its own after the command finishes
    pub wait_for_all: bool,
    /// Render supervision events on stderr
    pub verbose: bool,
    /// Forbid privilege elevation (setuid/setgid) in the launched command
    pub restrict_privileges: bool,
    /// Program followed by its arguments
    pub command: Vec<String>,
}

impl SupervisorOptions {
    /// Create options for running `command` with default behaviour
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Wait for natural termination instead of sweeping once the command exits
    pub fn wait_for_all(mut self, wait_for_all: bool) -> Self {
        self.wait_for_all = wait_for_all;
        self
    }

    /// Enable verbose event output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set no-new-privileges on the launched command
    pub fn restrict_privileges(mut self, restrict_privileges: bool) -> Self {
        self.restrict_privileges = restrict_privileges;
        self
    }

    /// Program name, used in diagnostics
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("")
    }

    /// Check the options describe something that can be launched
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.command.is_empty() {
            return Err(SupervisorError::InvalidConfig {
                details: "no command given".to_string(),
            });
        }
        Ok(())
    }
}

/// Final status of a supervised run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Code this process exits with
    pub exit_code: i32,
    /// The primary child was terminated by a signal rather than exiting
    pub killed_by_signal: bool,
}

impl ExitOutcome {
    /// Outcome when the primary child was never reaped
    pub const fn internal_error() -> Self {
        Self {
            exit_code: INTERNAL_ERROR_EXIT_CODE,
            killed_by_signal: false,
        }
    }

    /// Derive the outcome from the primary child's wait status
    ///
    /// A child killed by a signal never produced an exit status of its own,
    /// so the run reports the internal error code.
    pub fn from_status(status: unsafe_unix_process::ChildStatus) -> Self {
        use unsafe_unix_process::ChildStatus;

        match status {
            ChildStatus::Exited { code } => Self {
                exit_code: code & 0xff,
                killed_by_signal: false,
            },
            ChildStatus::Signaled { .. } => Self {
                exit_code: INTERNAL_ERROR_EXIT_CODE,
                killed_by_signal: true,
            },
            ChildStatus::Other { .. } => Self::internal_error(),
        }
    }
}

impl Default for ExitOutcome {
    fn default() -> Self {
        Self::internal_error()
    }
}

/// Supervise `options.command` on the current platform until its whole tree is gone
///
/// Installs process-wide signal handlers and waits on every child of the
/// calling process, so it must only be used from a dedicated single-threaded
/// program such as the `reap` binary.
pub fn run(options: SupervisorOptions) -> Result<ExitOutcome, SupervisorError> {
    Supervisor::new(options, create_platform()).run()
}
