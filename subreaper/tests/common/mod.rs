//! Common test utilities for driving the `reap` binary

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Initialize tracing for tests (idempotent)
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Command running the `reap` binary under test with the given arguments
pub fn reap_command<I, S>(args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(env!("CARGO_BIN_EXE_reap"));
    command.args(args).stdin(Stdio::null());
    command
}

/// Spawn `reap` with stderr captured
#[allow(dead_code)]
pub fn spawn_reap(args: &[&str]) -> (Child, StderrWatcher) {
    let mut child = reap_command(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn reap");
    let stderr = child.stderr.take().expect("stderr is piped");
    (child, StderrWatcher::new(stderr))
}

/// Wait for a child with a deadline, polling its status
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().expect("Failed to poll reap") {
            return Some(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Check whether a process with this pid still exists
#[allow(dead_code)]
pub fn process_exists(pid: u32) -> bool {
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Deliver a signal to a process
#[allow(dead_code)]
pub fn send_signal(pid: u32, signal: libc::c_int) {
    let result = unsafe { libc::kill(pid as libc::pid_t, signal) };
    assert_eq!(result, 0, "Failed to send signal {} to {}", signal, pid);
}

/// Poll a file until it holds a pid written by a test script
#[allow(dead_code)]
pub fn read_pid_file(path: &Path, timeout: Duration) -> u32 {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if let Ok(pid) = contents.trim().parse() {
                return pid;
            }
        }
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for {}",
            path.display()
        );
        thread::sleep(Duration::from_millis(20));
    }
}

/// Collects stderr lines from `reap` on a background thread
pub struct StderrWatcher {
    lines: mpsc::Receiver<String>,
    seen: Vec<String>,
}

impl StderrWatcher {
    pub fn new(stderr: ChildStderr) -> Self {
        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if sender.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            lines,
            seen: Vec::new(),
        }
    }

    /// Wait until a line containing `needle` shows up
    #[allow(dead_code)]
    pub fn wait_for(&mut self, needle: &str, timeout: Duration) -> bool {
        if self.seen.iter().any(|line| line.contains(needle)) {
            return true;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.lines.recv_timeout(remaining) {
                Ok(line) => {
                    let found = line.contains(needle);
                    self.seen.push(line);
                    if found {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
    }

    /// Everything written so far, waiting briefly for the writer to finish
    pub fn output(&mut self, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) => self.seen.push(line),
                Err(_) => break,
            }
        }
        self.seen.join("\n")
    }
}
