//! Escalation state shared between signal handlers and the wait loop
//!
//! The level lives in a single `AtomicU8` so it can be raised from a signal
//! handler and read by the loop after the interrupted wait returns. It only
//! ever moves upwards: None -> Graceful -> Forceful.
//!
//! SIGINT and SIGTERM both request a graceful sweep. Only SIGTERM escalates
//! further, and it does so whenever a graceful sweep is already under way,
//! whatever started it. That includes the sweep started by the primary child
//! exiting without `wait_for_all`: from then on, the first external SIGTERM
//! already moves to Forceful.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// How aggressively descendants are being terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EscalationLevel {
    /// Leave descendants alone
    None = 0,
    /// Ask descendants to exit with SIGTERM
    Graceful = 1,
    /// Kill descendants with SIGKILL
    Forceful = 2,
}

impl EscalationLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => EscalationLevel::None,
            1 => EscalationLevel::Graceful,
            _ => EscalationLevel::Forceful,
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EscalationLevel::None => "none",
            EscalationLevel::Graceful => "graceful",
            EscalationLevel::Forceful => "forceful",
        };
        f.write_str(name)
    }
}

/// Monotonic escalation level, safe to update from a signal handler
#[derive(Debug)]
pub struct EscalationState {
    level: AtomicU8,
}

impl EscalationState {
    pub const fn new() -> Self {
        Self {
            level: AtomicU8::new(EscalationLevel::None as u8),
        }
    }

    /// Current level
    pub fn level(&self) -> EscalationLevel {
        EscalationLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    /// Raise to at least `level`; returns the resulting level
    pub fn raise(&self, level: EscalationLevel) -> EscalationLevel {
        let previous = self.level.fetch_max(level as u8, Ordering::AcqRel);
        EscalationLevel::from_u8(previous.max(level as u8))
    }

    /// Interactive interrupt (SIGINT)
    pub fn on_interrupt(&self) -> EscalationLevel {
        self.raise(EscalationLevel::Graceful)
    }

    /// Termination request (SIGTERM)
    pub fn on_terminate(&self) -> EscalationLevel {
        let previous = self
            .level
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = if current == EscalationLevel::None as u8 {
                    EscalationLevel::Graceful
                } else {
                    EscalationLevel::Forceful
                };
                Some(current.max(next as u8))
            })
            .unwrap_or_else(|current| current);

        if previous == EscalationLevel::None as u8 {
            EscalationLevel::Graceful
        } else {
            EscalationLevel::Forceful
        }
    }

    /// The primary child exited and the run is not waiting for the whole tree
    pub fn on_primary_exit(&self) -> EscalationLevel {
        self.raise(EscalationLevel::Graceful)
    }

    /// Dispatch a received signal number; other signals leave the level untouched
    pub fn on_signal(&self, signal: libc::c_int) -> EscalationLevel {
        match signal {
            libc::SIGINT => self.on_interrupt(),
            libc::SIGTERM => self.on_terminate(),
            _ => self.level(),
        }
    }
}

impl Default for EscalationState {
    fn default() -> Self {
        Self::new()
    }
}
