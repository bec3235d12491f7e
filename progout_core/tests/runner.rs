//! Integration tests for spawning real processes through `ProcessRunner`.
//!
//! These rely on a POSIX `/bin/sh` and the usual coreutils.
#![cfg(unix)]

use std::time::Duration;

use progout_core::{CommandSpec, ExecError, ProcessRunner};
use tokio::io::AsyncReadExt;

/// Wait until `pid` has no process table entry, i.e. it was killed and reaped.
/// A zombie still shows up under `/proc`.
#[cfg(target_os = "linux")]
async fn assert_reaped(pid: u32) {
    use std::path::Path;

    let entry = format!("/proc/{pid}");
    for _ in 0..100 {
        if !Path::new(&entry).exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("process {pid} is still in the process table");
}

#[cfg(not(target_os = "linux"))]
async fn assert_reaped(_pid: u32) {}

#[tokio::test]
async fn test_execute_pipes_output_without_separate_stderr() {
    let runner = ProcessRunner::new();
    let mut process = runner.execute(&CommandSpec::from_string("echo spam")).unwrap();
    assert!(process.error_stream().is_none());

    let mut output = String::new();
    process
        .output_stream()
        .read_to_string(&mut output)
        .await
        .unwrap();
    assert_eq!(output, "spam\n");
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_execute_with_shell() {
    let runner = ProcessRunner::new();
    let mut process = runner.execute(&CommandSpec::shell("echo spam")).unwrap();
    assert!(process.error_stream().is_none());
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_execute_with_hidden_standard_error() {
    let runner = ProcessRunner::new();
    let spec = CommandSpec::from_string("echo spam").with_hidden_standard_error(true);
    let mut process = runner.execute(&spec).unwrap();
    assert!(process.error_stream().is_some());
    assert!(process.id().is_some());
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_output() {
    let runner = ProcessRunner::new();
    let result = runner
        .get_output(&CommandSpec::from_string("echo spam"))
        .await
        .unwrap();
    assert_eq!(result.into_parts(), (0, "spam".to_string()));
}

#[tokio::test]
async fn test_get_output_from_sequence() {
    let runner = ProcessRunner::new();
    let result = runner
        .get_output(&CommandSpec::from_sequence(["printf", "%s|%s", "spam with", "eggs"]))
        .await
        .unwrap();
    assert_eq!(result.output, "spam with|eggs");
}

#[tokio::test]
async fn test_get_output_non_zero() {
    let runner = ProcessRunner::new();
    let result = runner
        .get_output(&CommandSpec::from_string("sh -c 'echo spam; exit 1'"))
        .await
        .unwrap();
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.output, "spam");
}

#[tokio::test]
async fn test_get_output_with_hidden_standard_error() {
    let runner = ProcessRunner::new();
    let spec = CommandSpec::from_string("sh -c 'printf spam >&2'").with_hidden_standard_error(true);
    let result = runner.get_output(&spec).await.unwrap();
    assert_eq!(result.into_parts(), (0, String::new()));
}

#[tokio::test]
async fn test_get_output_merges_visible_standard_error() {
    let runner = ProcessRunner::new();
    let spec = CommandSpec::shell("echo spam; echo eggs >&2; echo ham");
    let result = runner.get_output(&spec).await.unwrap();
    assert_eq!(result.output, "spam\neggs\nham");
}

#[tokio::test]
async fn test_get_output_with_working_directory() {
    let tmpdir = tempfile::tempdir().unwrap();
    let cwd = tmpdir.path().canonicalize().unwrap();
    let runner = ProcessRunner::new();
    let spec = CommandSpec::shell("pwd -P").with_working_directory(&cwd);
    let result = runner.get_output(&spec).await.unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, cwd.to_string_lossy());
}

#[tokio::test]
async fn test_large_output_does_not_deadlock() {
    let runner = ProcessRunner::new().with_timeout(Some(Duration::from_secs(30)));
    // Well past any pipe buffer, on both streams.
    let spec = CommandSpec::shell(
        "i=0; while [ $i -lt 20000 ]; do echo line-$i; echo err-$i >&2; i=$((i+1)); done",
    )
    .with_hidden_standard_error(true);
    let result = runner.get_output(&spec).await.unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output.lines().count(), 20000);
    assert!(result.output.ends_with("line-19999"));
}

#[tokio::test]
async fn test_missing_program_is_spawn_failure() {
    let runner = ProcessRunner::new();
    let err = runner
        .get_output(&CommandSpec::from_string("progout-no-such-program --flag"))
        .await
        .unwrap_err();
    assert!(err.is_spawn_failure());
    assert!(err.to_string().contains("progout-no-such-program"));
}

#[tokio::test]
async fn test_missing_working_directory_is_spawn_failure() {
    let tmpdir = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new();
    let spec =
        CommandSpec::from_string("echo spam").with_working_directory(tmpdir.path().join("gone"));
    let err = runner.get_output(&spec).await.unwrap_err();
    assert!(err.is_spawn_failure());
}

#[tokio::test]
async fn test_invalid_utf8_output_is_decode_error() {
    let runner = ProcessRunner::new();
    let err = runner
        .get_output(&CommandSpec::shell(r"printf 'sp\377am'"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::OutputDecode(_)));
}

#[tokio::test]
async fn test_timeout_kills_slow_command() {
    let tmpdir = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new().with_timeout(Some(Duration::from_millis(300)));
    // `exec` keeps the pid the runner spawned.
    let spec =
        CommandSpec::shell("echo $$ > pid; exec sleep 10").with_working_directory(tmpdir.path());
    let err = runner.get_output(&spec).await.unwrap_err();
    assert!(matches!(err, ExecError::Timeout(_)));

    let pid = std::fs::read_to_string(tmpdir.path().join("pid")).unwrap();
    assert_reaped(pid.trim().parse().unwrap()).await;
}

#[tokio::test]
async fn test_kill_stops_and_reaps_child() {
    let runner = ProcessRunner::new();
    let mut process = runner.execute(&CommandSpec::from_string("sleep 10")).unwrap();
    let pid = process.id().unwrap();

    process.kill().await.unwrap();
    assert_eq!(process.wait().await.unwrap(), -9);
    assert!(process.id().is_none());
    assert_reaped(pid).await;
}

#[tokio::test]
async fn test_signal_exit_code_is_negative() {
    let runner = ProcessRunner::new();
    let result = runner
        .get_output(&CommandSpec::shell("kill -9 $$"))
        .await
        .unwrap();
    assert_eq!(result.exit_code, -9);
}

#[tokio::test]
async fn test_dropping_partially_read_handle_kills_child() {
    let runner = ProcessRunner::new();
    let mut process = runner.execute(&CommandSpec::from_string("yes spam")).unwrap();
    let mut buf = [0_u8; 16];
    process.output_stream().read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf[..5], b"spam\n");
    let pid = process.id().unwrap();

    drop(process);
    assert_reaped(pid).await;
}
