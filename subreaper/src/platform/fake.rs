//! In-memory platform for exercising supervision logic without touching real processes

use crate::platform::{KillSignal, ReaperPlatform};
use crate::{PlatformError, ProcessId};
use std::cell::RefCell;
use unsafe_unix_process::Errno;

#[derive(Debug, Default)]
pub(crate) struct FakePlatform {
    descendants: RefCell<Vec<ProcessId>>,
    exited: Vec<ProcessId>,
    enumeration_unavailable: bool,
    bulk_kill: bool,
    restrict_error: Option<Errno>,
    sent: RefCell<Vec<(ProcessId, KillSignal)>>,
    bulk_sent: RefCell<Vec<KillSignal>>,
}

impl FakePlatform {
    pub(crate) fn with_descendants(pids: &[u32]) -> Self {
        Self {
            descendants: RefCell::new(pids.iter().copied().map(ProcessId).collect()),
            ..Self::default()
        }
    }

    pub(crate) fn without_enumeration() -> Self {
        Self {
            enumeration_unavailable: true,
            ..Self::default()
        }
    }

    /// Listed descendants that fail to be signaled with ESRCH
    pub(crate) fn with_exited(mut self, pids: &[u32]) -> Self {
        self.exited = pids.iter().copied().map(ProcessId).collect();
        self
    }

    pub(crate) fn with_bulk_kill(mut self) -> Self {
        self.bulk_kill = true;
        self
    }

    pub(crate) fn with_restrict_error(mut self, errno: Errno) -> Self {
        self.restrict_error = Some(errno);
        self
    }

    pub(crate) fn remove_descendant(&self, pid: u32) {
        self.descendants.borrow_mut().retain(|p| p.0 != pid);
    }

    pub(crate) fn sent(&self) -> Vec<(ProcessId, KillSignal)> {
        self.sent.borrow().clone()
    }

    pub(crate) fn bulk_sent(&self) -> Vec<KillSignal> {
        self.bulk_sent.borrow().clone()
    }
}

impl ReaperPlatform for FakePlatform {
    fn register_subreaper(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn restrict_privileges(&self) -> Result<(), Errno> {
        match self.restrict_error {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn enumerate_descendants(&self) -> Result<Vec<ProcessId>, PlatformError> {
        if self.enumeration_unavailable {
            return Err(PlatformError::DescendantsUnavailable {
                details: "children list unavailable".to_string(),
            });
        }
        Ok(self.descendants.borrow().clone())
    }

    fn signal_process(&self, pid: ProcessId, signal: KillSignal) -> Result<(), Errno> {
        self.sent.borrow_mut().push((pid, signal));
        if self.exited.contains(&pid) {
            return Err(Errno(libc::ESRCH));
        }
        Ok(())
    }

    fn signal_all_descendants(&self, signal: KillSignal) -> Result<Option<usize>, PlatformError> {
        if !self.bulk_kill {
            return Ok(None);
        }
        self.bulk_sent.borrow_mut().push(signal);
        Ok(Some(self.descendants.borrow().len()))
    }
}
