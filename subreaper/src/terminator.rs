//! Kill sweeps over the subreaper's descendants

use crate::events::SupervisorEvent;
use crate::platform::{KillSignal, ReaperPlatform};
use crate::{EscalationLevel, SupervisorError};

/// Sends the signal matching the current escalation level to every descendant
///
/// Sweeps are best-effort: a target that cannot be signaled is logged and
/// skipped. The returned count only includes successful deliveries, so a
/// sweep returning zero means there was nobody left to terminate.
pub struct Terminator<'a, P: ReaperPlatform> {
    platform: &'a P,
}

impl<'a, P: ReaperPlatform> Terminator<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    /// Signal all descendants for `level`, returning how many were signaled
    pub fn terminate_all(&self, level: EscalationLevel) -> usize {
        let Some(signal) = KillSignal::for_level(level) else {
            return 0;
        };

        match self.platform.signal_all_descendants(signal) {
            Ok(Some(signaled)) => {
                tracing::debug!(signaled, signal = ?signal, "signaled all descendants");
                return signaled;
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!("{}", error);
                return 0;
            }
        }

        let descendants = match self.platform.enumerate_descendants() {
            Ok(descendants) => descendants,
            Err(error) => {
                tracing::warn!("{}", error);
                return 0;
            }
        };

        let mut signaled = 0;
        for pid in descendants {
            SupervisorEvent::Killing { pid }.emit();

            match self.platform.signal_process(pid, signal) {
                Ok(()) => signaled += 1,
                Err(errno) => {
                    let already_gone = errno.is_no_such_process();
                    let error = SupervisorError::SignalFailed {
                        pid,
                        source: errno.into(),
                    };
                    if already_gone {
                        tracing::debug!("{}", error);
                    } else {
                        tracing::warn!("{}", error);
                    }
                }
            }
        }

        signaled
    }
}
