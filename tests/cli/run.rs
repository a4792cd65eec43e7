//! Sending messages through the binary

use super::{kinetic, stdout_lines};
use std::io::Write;
use std::process::Stdio;

#[test]
fn test_messages_are_printed_in_order() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path())
        .args(["--log-level", "off", "hello", "stream", "world"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_lines(&output), vec!["hello", "stream", "world"]);
}

#[test]
fn test_no_messages_exits_cleanly() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path())
        .args(["--log-level", "off"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_stdin_lines_are_sent() {
    let home = tempfile::tempdir().unwrap();
    let mut child = kinetic(home.path())
        .args(["--log-level", "off", "--stdin", "first"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "second").unwrap();
        writeln!(stdin, "third").unwrap();
    }

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["first", "second", "third"]);
}

#[test]
fn test_logs_go_to_stderr() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path())
        .args(["--log-level", "info", "--no-color", "ping"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["ping"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("starting"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_stream_name_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path())
        .args(["--stream", "not a stream", "hello"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid character"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_log_level_rejected_by_parser() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path())
        .args(["--log-level", "loud"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_version_includes_build_metadata() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path()).arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains("commit"), "stdout: {}", stdout);
}
