//! The supervision loop
//!
//! [`Supervisor::run`] registers as subreaper, installs the signal handlers,
//! launches the command and then reaps descendants until none are left.
//! Each wait result is fed to a [`Supervision`], which holds the per-run
//! state and decides whether to sweep and whether the run is over.

use crate::events::SupervisorEvent;
use crate::platform::ReaperPlatform;
use crate::{
    launcher, signals, EscalationLevel, EscalationState, ExitOutcome, ProcessId,
    SupervisorError, SupervisorOptions, Terminator,
};
use unsafe_unix_process::{safe_suspend, safe_try_wait_any, ChildStatus, SignalSet};

/// Result of one blocking wait for a descendant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// No children are left to wait for
    NoChildren,
    /// A signal raised the escalation level while waiting
    Interrupted,
    /// A descendant exited and was reaped
    Reaped { pid: ProcessId, status: ChildStatus },
}

/// Whether the wait loop goes on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Done,
}

/// State of one supervised run, from launch until the tree is gone
pub struct Supervision<'a, P: ReaperPlatform> {
    primary: ProcessId,
    wait_for_all: bool,
    escalation: &'a EscalationState,
    terminator: Terminator<'a, P>,
    outcome: Option<ExitOutcome>,
    announced: EscalationLevel,
}

impl<'a, P: ReaperPlatform> Supervision<'a, P> {
    pub fn new(
        primary: ProcessId,
        wait_for_all: bool,
        escalation: &'a EscalationState,
        platform: &'a P,
    ) -> Self {
        Self {
            primary,
            wait_for_all,
            escalation,
            terminator: Terminator::new(platform),
            outcome: None,
            announced: EscalationLevel::None,
        }
    }

    /// Process one wait result and sweep if escalation was requested
    pub fn handle(&mut self, wait: WaitOutcome) -> LoopControl {
        match wait {
            WaitOutcome::NoChildren => return LoopControl::Done,
            // The handler has already raised the level
            WaitOutcome::Interrupted => {}
            WaitOutcome::Reaped { pid, status } if pid == self.primary => {
                SupervisorEvent::ReapedChild { pid, status }.emit();
                self.outcome = Some(ExitOutcome::from_status(status));
                if !self.wait_for_all {
                    self.escalation.on_primary_exit();
                }
            }
            WaitOutcome::Reaped { pid, .. } => {
                SupervisorEvent::ReapedDescendant { pid }.emit();
            }
        }

        let level = self.escalation.level();
        if level > self.announced {
            SupervisorEvent::Escalating { level }.emit();
            self.announced = level;
        }

        if level == EscalationLevel::None {
            return LoopControl::Continue;
        }

        if self.terminator.terminate_all(level) == 0 {
            LoopControl::Done
        } else {
            LoopControl::Continue
        }
    }

    /// A signal raised the level and no sweep has run for it yet
    pub fn escalation_pending(&self) -> bool {
        self.escalation.level() > self.announced
    }

    /// Final outcome; the internal error code if the primary child was never reaped
    pub fn outcome(&self) -> ExitOutcome {
        self.outcome.unwrap_or_default()
    }
}

/// Runs one command as a subreaper until its whole process tree is gone
pub struct Supervisor<P: ReaperPlatform> {
    options: SupervisorOptions,
    platform: P,
}

impl<P: ReaperPlatform> Supervisor<P> {
    pub fn new(options: SupervisorOptions, platform: P) -> Self {
        Self { options, platform }
    }

    /// Supervise until no descendants remain
    ///
    /// Installs process-wide signal handlers and reaps any child of the
    /// calling process, so only one supervisor may run per process.
    pub fn run(self) -> Result<ExitOutcome, SupervisorError> {
        self.options.validate()?;

        self.platform
            .register_subreaper()
            .map_err(|source| SupervisorError::SubreaperRegistrationFailed { source })?;

        let wakeup = signals::install(self.options.verbose)?;

        let primary = launcher::launch(&self.options, &self.platform)?;
        SupervisorEvent::Spawned { pid: primary }.emit();

        let mut supervision = Supervision::new(
            primary,
            self.options.wait_for_all,
            signals::escalation(),
            &self.platform,
        );

        loop {
            let wait = wait_for_descendant(
                &wakeup,
                || supervision.escalation_pending(),
                self.options.program(),
            )?;
            if supervision.handle(wait) == LoopControl::Done {
                break;
            }
        }

        let outcome = supervision.outcome();
        SupervisorEvent::Exiting {
            code: outcome.exit_code,
        }
        .emit();

        Ok(outcome)
    }
}

/// Reap one descendant, sleeping until a signal arrives while none has exited
///
/// Runs with the supervision signals blocked. Handlers only run inside
/// `safe_suspend`, so an escalation cannot land between the pending check
/// and going to sleep.
fn wait_for_descendant(
    wakeup: &SignalSet,
    escalation_pending: impl Fn() -> bool,
    program: &str,
) -> Result<WaitOutcome, SupervisorError> {
    loop {
        if escalation_pending() {
            return Ok(WaitOutcome::Interrupted);
        }

        match safe_try_wait_any() {
            Ok(Some((pid, status))) => {
                return Ok(WaitOutcome::Reaped {
                    pid: ProcessId(pid),
                    status,
                })
            }
            Ok(None) => safe_suspend(wakeup),
            Err(errno) if errno.is_no_children() => return Ok(WaitOutcome::NoChildren),
            Err(errno) if errno.is_interrupted() => {}
            Err(errno) => {
                return Err(SupervisorError::WaitFailed {
                    command: program.to_string(),
                    source: errno.into(),
                })
            }
        }
    }
}
