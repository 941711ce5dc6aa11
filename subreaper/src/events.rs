//! Structured supervision events
//!
//! Events are emitted through `tracing` at INFO. The `reap` binary only lets
//! them through when running verbose.

use crate::{EscalationLevel, ProcessId};
use std::fmt;
use unsafe_unix_process::ChildStatus;

/// Something noteworthy the supervisor did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The command was launched
    Spawned { pid: ProcessId },
    /// The primary child was reaped
    ReapedChild { pid: ProcessId, status: ChildStatus },
    /// Some other descendant was reaped
    ReapedDescendant { pid: ProcessId },
    /// A kill sweep is about to signal this descendant
    Killing { pid: ProcessId },
    /// The escalation level went up
    Escalating { level: EscalationLevel },
    /// Supervision finished
    Exiting { code: i32 },
}

impl SupervisorEvent {
    /// Log the event at INFO; the rendered text already carries every field
    pub fn emit(&self) {
        tracing::info!("{}", self);
    }
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorEvent::Spawned { pid } => write!(f, "spawned child {}", pid),
            SupervisorEvent::ReapedChild { pid, status } => {
                write!(f, "reaped child {} [{}]", pid, status)
            }
            SupervisorEvent::ReapedDescendant { pid } => write!(f, "reaped descendant {}", pid),
            SupervisorEvent::Killing { pid } => write!(f, "killing {}", pid),
            SupervisorEvent::Escalating { level } => write!(f, "escalating to {}", level),
            SupervisorEvent::Exiting { code } => write!(f, "exiting [status {}]", code),
        }
    }
}
