//! Signal-driven escalation of a running `reap`

mod common;

use common::*;
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_interrupt_terminates_long_running_command() {
    let (mut child, mut stderr) = spawn_reap(&["-v", "sleep", "30"]);
    assert!(
        stderr.wait_for("spawned child", TIMEOUT),
        "reap never reported its child"
    );

    send_signal(child.id(), libc::SIGINT);
    let status = wait_with_timeout(&mut child, TIMEOUT).expect("reap did not finish");

    // sleep was killed by SIGTERM and never produced an exit status
    assert_eq!(status.code(), Some(111));
    let output = stderr.output(Duration::from_secs(1));
    assert!(output.contains("SIGINT received"), "unexpected stderr: {}", output);
    assert!(output.contains("escalating to graceful"), "unexpected stderr: {}", output);
    assert!(output.contains("killing"), "unexpected stderr: {}", output);
    assert!(!output.contains("escalating to forceful"), "unexpected stderr: {}", output);
}

#[test]
fn test_single_termination_request_is_graceful() {
    let (mut child, mut stderr) = spawn_reap(&["-v", "sleep", "30"]);
    assert!(stderr.wait_for("spawned child", TIMEOUT));

    send_signal(child.id(), libc::SIGTERM);
    let status = wait_with_timeout(&mut child, TIMEOUT).expect("reap did not finish");

    assert_eq!(status.code(), Some(111));
    let output = stderr.output(Duration::from_secs(1));
    assert!(output.contains("SIGTERM received, terminating"), "unexpected stderr: {}", output);
    assert!(!output.contains("escalating to forceful"), "unexpected stderr: {}", output);
}

#[test]
fn test_second_termination_request_kills_stubborn_tree() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let ready = dir.path().join("ready");
    let script = format!("trap '' TERM; echo $$ > {}; sleep 30", ready.display());

    let (mut child, mut stderr) = spawn_reap(&["-v", "/bin/sh", "-c", &script]);
    read_pid_file(&ready, TIMEOUT);

    send_signal(child.id(), libc::SIGINT);
    assert!(stderr.wait_for("escalating to graceful", TIMEOUT));

    // SIGTERM is ignored by the whole tree, so reap keeps waiting
    thread::sleep(Duration::from_millis(300));
    assert!(
        child.try_wait().expect("Failed to poll reap").is_none(),
        "reap gave up while descendants were still alive"
    );

    send_signal(child.id(), libc::SIGTERM);
    let status = wait_with_timeout(&mut child, TIMEOUT).expect("reap did not finish");

    assert_eq!(status.code(), Some(111));
    let output = stderr.output(Duration::from_secs(1));
    assert!(output.contains("escalating to forceful"), "unexpected stderr: {}", output);
    assert!(output.contains("reaped child"), "unexpected stderr: {}", output);
}

#[test]
fn test_wait_for_all_still_honours_interrupt() {
    let (mut child, mut stderr) = spawn_reap(&["-w", "-v", "/bin/sh", "-c", "sleep 30 & exit 0"]);
    assert!(stderr.wait_for("reaped child", TIMEOUT));

    send_signal(child.id(), libc::SIGINT);
    let status = wait_with_timeout(&mut child, TIMEOUT).expect("reap did not finish");

    // The command itself exited normally before the interrupt
    assert_eq!(status.code(), Some(0));
    let output = stderr.output(Duration::from_secs(1));
    assert!(output.contains("killing"), "unexpected stderr: {}", output);
}

#[test]
fn test_termination_right_after_launch_is_not_lost() {
    let (mut child, mut stderr) =
        spawn_reap(&["/bin/sh", "-c", "echo started >&2; exec sleep 30"]);
    assert!(stderr.wait_for("started", TIMEOUT), "command never started");

    // Sent without pausing, possibly before reap reaches its wait
    send_signal(child.id(), libc::SIGTERM);
    let status = wait_with_timeout(&mut child, TIMEOUT).expect("reap missed SIGTERM");

    assert_eq!(status.code(), Some(111));
}
