//! SIGINT/SIGTERM handling
//!
//! The handlers only raise the process-wide [`EscalationState`] and, when
//! verbose, write a fixed message straight to stderr. SIGCHLD gets a no-op
//! handler so that a child exit wakes the wait loop.
//!
//! All three signals stay blocked except while the wait loop sleeps in
//! `safe_suspend`, so a signal arriving while the loop is busy is held
//! pending and wakes the next sleep immediately.

use crate::{EscalationLevel, EscalationState, SupervisorError};
use std::sync::atomic::{AtomicBool, Ordering};
use unsafe_unix_process::{
    safe_block_signals, safe_install_signal_handler, safe_write_stderr, SignalSet,
};

/// Signals the wait loop sleeps on
pub const SUPERVISION_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGCHLD];

static ESCALATION: EscalationState = EscalationState::new();
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Escalation state driven by the installed signal handlers
pub fn escalation() -> &'static EscalationState {
    &ESCALATION
}

/// Block the supervision signals and install their handlers
///
/// Returns the mask to sleep with: the previous mask with the supervision
/// signals let through.
pub fn install(verbose: bool) -> Result<SignalSet, SupervisorError> {
    VERBOSE.store(verbose, Ordering::Release);

    // Block first so nothing is delivered before the loop is ready for it
    let previous = safe_block_signals(&SignalSet::of(&SUPERVISION_SIGNALS))
        .map_err(|errno| SupervisorError::SignalMaskFailed {
            source: errno.into(),
        })?;

    let handlers: [(libc::c_int, &'static str, extern "C" fn(libc::c_int)); 3] = [
        (libc::SIGINT, "SIGINT", handle_signal),
        (libc::SIGTERM, "SIGTERM", handle_signal),
        (libc::SIGCHLD, "SIGCHLD", handle_child_exit),
    ];
    for (signal, name, handler) in handlers {
        safe_install_signal_handler(signal, handler).map_err(|errno| {
            SupervisorError::SignalSetupFailed {
                signal: name,
                source: errno.into(),
            }
        })?;
    }

    tracing::debug!("installed SIGINT, SIGTERM and SIGCHLD handlers");
    Ok(previous.without(&SUPERVISION_SIGNALS))
}

extern "C" fn handle_child_exit(_signal: libc::c_int) {}

extern "C" fn handle_signal(signal: libc::c_int) {
    let level = ESCALATION.on_signal(signal);
    if VERBOSE.load(Ordering::Acquire) {
        safe_write_stderr(notice(signal, level));
    }
}

fn notice(signal: libc::c_int, level: EscalationLevel) -> &'static [u8] {
    match (signal == libc::SIGINT, level) {
        (true, EscalationLevel::Forceful) => b"reap: SIGINT received, killing descendants\n",
        (true, _) => b"reap: SIGINT received, terminating descendants\n",
        (false, EscalationLevel::Forceful) => b"reap: SIGTERM received, killing descendants\n",
        (false, _) => b"reap: SIGTERM received, terminating descendants\n",
    }
}
