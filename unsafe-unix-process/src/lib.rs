//! Unsafe POSIX process operations with safe wrappers
//!
//! This crate provides safe wrappers around the portable Unix system calls the
//! subreaper needs: fork/exec with a close-on-exec status pipe, waiting for
//! descendants, delivering signals, and managing signal handlers and masks.
//! All unsafe operations are contained within this crate and exposed through safe APIs.
//!
//! Several of these wrappers are called between `fork` and `exec`, or from a
//! signal handler. Those never allocate and report failures as a bare [`Errno`].
#![cfg(unix)]

use std::ffi::{CString, NulError};
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr;

pub use libc::c_int;

/// Raw error number reported by a failed system call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// Read the calling thread's current `errno`
    pub fn last() -> Self {
        Self(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }

    /// The call was interrupted by a signal handler
    pub fn is_interrupted(self) -> bool {
        self.0 == libc::EINTR
    }

    /// The calling process has no children left to wait for
    pub fn is_no_children(self) -> bool {
        self.0 == libc::ECHILD
    }

    /// The target process does not exist (anymore)
    pub fn is_no_such_process(self) -> bool {
        self.0 == libc::ESRCH
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", io::Error::from_raw_os_error(self.0))
    }
}

impl std::error::Error for Errno {}

impl From<Errno> for io::Error {
    fn from(errno: Errno) -> Self {
        io::Error::from_raw_os_error(errno.0)
    }
}

/// How a reaped process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Process called exit with this code
    Exited { code: i32 },
    /// Process was terminated by this signal
    Signaled { signal: i32 },
    /// Any other state change reported by waitpid
    Other { raw: i32 },
}

impl ChildStatus {
    /// Decode a raw waitpid status word
    pub fn from_raw(status: c_int) -> Self {
        if libc::WIFEXITED(status) {
            ChildStatus::Exited {
                code: libc::WEXITSTATUS(status),
            }
        } else if libc::WIFSIGNALED(status) {
            ChildStatus::Signaled {
                signal: libc::WTERMSIG(status),
            }
        } else {
            ChildStatus::Other { raw: status }
        }
    }
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Exited { code } => write!(f, "status {}", code),
            ChildStatus::Signaled { signal } => write!(f, "signal {}", signal),
            ChildStatus::Other { raw } => write!(f, "raw status {:#x}", raw),
        }
    }
}

/// Outcome of a fork, seen from either side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkResult {
    /// Running in the original process; `child` is the new process id
    Parent { child: u32 },
    /// Running in the newly created process
    Child,
}

/// Argument vector prepared ahead of a fork so the child never allocates
pub struct ExecArgs {
    args: Vec<CString>,
    argv: Vec<*const libc::c_char>,
}

impl ExecArgs {
    /// Convert `command` (program followed by its arguments) to C strings
    pub fn new<S: AsRef<str>>(command: &[S]) -> Result<Self, NulError> {
        let args = command
            .iter()
            .map(|arg| CString::new(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut argv: Vec<*const libc::c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(ptr::null());

        Ok(Self { args, argv })
    }

    /// Program name as passed to execvp
    pub fn program(&self) -> Option<&CString> {
        self.args.first()
    }
}

/// Get the process ID of the calling process
pub fn safe_getpid() -> u32 {
    unsafe { libc::getpid() as u32 }
}

/// Create a pipe whose both ends are closed on exec
pub fn safe_pipe_cloexec() -> Result<(OwnedFd, OwnedFd), Errno> {
    let mut fds = [0 as c_int; 2];

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    {
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } == -1 {
            return Err(Errno::last());
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    {
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(Errno::last());
        }
        for fd in fds {
            if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
                let errno = Errno::last();
                unsafe {
                    libc::close(fds[0]);
                    libc::close(fds[1]);
                }
                return Err(errno);
            }
        }
    }

    // SAFETY: both descriptors were just returned by pipe and are owned by nobody else
    let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    Ok((read_end, write_end))
}

/// Fork the calling process
///
/// The caller must be single-threaded: in the child only async-signal-safe
/// operations may run until exec or `_exit`.
pub fn safe_fork() -> Result<ForkResult, Errno> {
    match unsafe { libc::fork() } {
        -1 => Err(Errno::last()),
        0 => Ok(ForkResult::Child),
        pid => Ok(ForkResult::Parent { child: pid as u32 }),
    }
}

/// Replace the process image, searching `PATH` for the program
///
/// Only returns on failure.
pub fn safe_execvp(args: &ExecArgs) -> Errno {
    let Some(program) = args.program() else {
        return Errno(libc::EINVAL);
    };

    unsafe {
        libc::execvp(program.as_ptr(), args.argv.as_ptr());
    }

    Errno::last()
}

/// Write one byte, retrying on EINTR; errors are ignored
pub fn safe_write_byte(fd: BorrowedFd<'_>, byte: u8) {
    loop {
        let written =
            unsafe { libc::write(fd.as_raw_fd(), &byte as *const u8 as *const libc::c_void, 1) };
        if written == -1 && Errno::last().is_interrupted() {
            continue;
        }
        return;
    }
}

/// Read a single byte, retrying on EINTR
///
/// Returns `None` at end-of-input.
pub fn safe_read_byte(fd: BorrowedFd<'_>) -> Result<Option<u8>, Errno> {
    let mut byte = 0u8;
    loop {
        let read =
            unsafe { libc::read(fd.as_raw_fd(), &mut byte as *mut u8 as *mut libc::c_void, 1) };
        match read {
            0 => return Ok(None),
            1 => return Ok(Some(byte)),
            _ => {
                let errno = Errno::last();
                if errno.is_interrupted() {
                    continue;
                }
                return Err(errno);
            }
        }
    }
}

/// Terminate the calling process immediately, skipping atexit handlers and destructors
pub fn safe_exit(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

/// Reap any child that has already exited, without blocking
///
/// Returns `None` while children exist but none of them has exited yet.
pub fn safe_try_wait_any() -> Result<Option<(u32, ChildStatus)>, Errno> {
    let mut status: c_int = 0;
    let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };

    match pid {
        -1 => Err(Errno::last()),
        0 => Ok(None),
        pid => Ok(Some((pid as u32, ChildStatus::from_raw(status)))),
    }
}

/// Block until the given child exits, retrying on EINTR
pub fn safe_wait_pid(pid: u32) -> Result<ChildStatus, Errno> {
    let mut status: c_int = 0;
    loop {
        if unsafe { libc::waitpid(pid as libc::pid_t, &mut status, 0) } != -1 {
            return Ok(ChildStatus::from_raw(status));
        }
        let errno = Errno::last();
        if !errno.is_interrupted() {
            return Err(errno);
        }
    }
}

/// Send a signal to a process
pub fn safe_kill(pid: u32, signal: c_int) -> Result<(), Errno> {
    if unsafe { libc::kill(pid as libc::pid_t, signal) } == -1 {
        return Err(Errno::last());
    }
    Ok(())
}

/// Install a handler for `signal` without SA_RESTART
///
/// Blocking calls interrupted by the signal fail with EINTR instead of
/// being transparently restarted.
pub fn safe_install_signal_handler(
    signal: c_int,
    handler: extern "C" fn(c_int),
) -> Result<(), Errno> {
    // SAFETY: a zeroed sigaction is valid; handler, flags and mask are filled below
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler as *const () as libc::sighandler_t;
    action.sa_flags = 0;

    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, ptr::null_mut()) == -1 {
            return Err(Errno::last());
        }
    }

    Ok(())
}

/// Reset the disposition of `signal` to its default action
///
/// Dispositions set to ignore survive exec, so this runs in a forked child
/// before exec. It neither allocates nor locks.
pub fn safe_reset_signal_default(signal: c_int) -> Result<(), Errno> {
    // SAFETY: a zeroed sigaction with SIG_DFL and an empty mask is valid
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = libc::SIG_DFL;

    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, ptr::null_mut()) == -1 {
            return Err(Errno::last());
        }
    }

    Ok(())
}

/// Set of signal numbers
///
/// Built ahead of a fork so the child only has to hand it to the kernel.
#[derive(Clone, Copy)]
pub struct SignalSet {
    set: libc::sigset_t,
}

impl SignalSet {
    /// The set holding no signals
    pub fn empty() -> Self {
        // SAFETY: sigemptyset initializes the whole set
        let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe { libc::sigemptyset(&mut set) };
        Self { set }
    }

    /// The set holding exactly `signals`
    pub fn of(signals: &[c_int]) -> Self {
        let mut set = Self::empty();
        for &signal in signals {
            unsafe { libc::sigaddset(&mut set.set, signal) };
        }
        set
    }

    /// This set minus `signals`
    pub fn without(mut self, signals: &[c_int]) -> Self {
        for &signal in signals {
            unsafe { libc::sigdelset(&mut self.set, signal) };
        }
        self
    }

    pub fn contains(&self, signal: c_int) -> bool {
        unsafe { libc::sigismember(&self.set, signal) == 1 }
    }
}

impl fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries((1..32).filter(|&signal| self.contains(signal)))
            .finish()
    }
}

fn change_signal_mask(how: c_int, set: &SignalSet) -> Result<SignalSet, Errno> {
    let mut previous = SignalSet::empty();
    let result = unsafe { libc::pthread_sigmask(how, &set.set, &mut previous.set) };

    // pthread_sigmask reports the error number directly
    if result != 0 {
        return Err(Errno(result));
    }

    Ok(previous)
}

/// Add `signals` to the calling thread's blocked mask; returns the previous mask
pub fn safe_block_signals(signals: &SignalSet) -> Result<SignalSet, Errno> {
    change_signal_mask(libc::SIG_BLOCK, signals)
}

/// Replace the calling thread's blocked mask; returns the previous mask
///
/// Safe to call between fork and exec.
pub fn safe_set_signal_mask(mask: &SignalSet) -> Result<SignalSet, Errno> {
    change_signal_mask(libc::SIG_SETMASK, mask)
}

/// Sleep with `mask` as the blocked mask until a signal handler has run
///
/// The previous mask is back in place when this returns. Signals that became
/// pending while blocked are delivered immediately, so none is missed between
/// checking some condition and going to sleep.
pub fn safe_suspend(mask: &SignalSet) {
    // Always fails with EINTR once a handler returns
    unsafe { libc::sigsuspend(&mask.set) };
}

/// Write a preformatted message to stderr from any context, signal handlers included
///
/// `errno` is left untouched so an interrupted call still observes EINTR.
pub fn safe_write_stderr(message: &[u8]) {
    preserving_errno(|| {
        let mut remaining = message;
        while !remaining.is_empty() {
            let written = unsafe {
                libc::write(
                    libc::STDERR_FILENO,
                    remaining.as_ptr() as *const libc::c_void,
                    remaining.len(),
                )
            };
            if written > 0 {
                remaining = &remaining[written as usize..];
            } else if written == -1 && Errno::last().is_interrupted() {
                continue;
            } else {
                break;
            }
        }
    });
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn errno_location() -> *mut c_int {
    libc::__errno_location()
}

#[cfg(any(target_os = "freebsd", target_os = "dragonfly", target_os = "macos", target_os = "ios"))]
unsafe fn errno_location() -> *mut c_int {
    libc::__error()
}

#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
unsafe fn errno_location() -> *mut c_int {
    libc::__errno()
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "macos",
    target_os = "ios",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn preserving_errno<F: FnOnce()>(f: F) {
    let saved = unsafe { *errno_location() };
    f();
    unsafe { *errno_location() = saved };
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "macos",
    target_os = "ios",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn preserving_errno<F: FnOnce()>(f: F) {
    f();
}
