//! Error types for the supervisor

use std::io;

/// Main error type for supervision
///
/// Every variant except `SignalFailed` is fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("failed to become subreaper: {source}")]
    SubreaperRegistrationFailed {
        #[source]
        source: PlatformError,
    },

    #[error("failed to install handler for {signal}: {source}")]
    SignalSetupFailed {
        signal: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to block supervision signals: {source}")]
    SignalMaskFailed {
        #[source]
        source: io::Error,
    },

    #[error("exec {command}: {source}")]
    LaunchFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("waitpid {command}: {source}")]
    WaitFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("kill {pid}: {source}")]
    SignalFailed {
        pid: crate::ProcessId,
        #[source]
        source: io::Error,
    },
}

/// Platform-specific error types
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{syscall}: {source}")]
    SystemCallFailed {
        syscall: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{details}")]
    DescendantsUnavailable { details: String },

    #[error("unsupported platform: {operation}")]
    Unsupported { operation: &'static str },
}

impl PlatformError {
    pub(crate) fn syscall(syscall: &'static str, errno: unsafe_unix_process::Errno) -> Self {
        PlatformError::SystemCallFailed {
            syscall,
            source: errno.into(),
        }
    }
}
