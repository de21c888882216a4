// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::process::Command;

#[tokio::test]
async fn captures_output_of_fast_command() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo").await.unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn times_out_hung_command() {
    let mut cmd = Command::new("sleep");
    cmd.arg("30");
    let err = run_with_timeout(cmd, Duration::from_millis(100), "sleep").await.unwrap_err();
    assert!(matches!(err, SubprocessError::TimedOut { .. }));
}

#[tokio::test]
async fn missing_binary_is_io_error() {
    let cmd = Command::new("quarry-definitely-not-a-binary");
    let err = run_with_timeout(cmd, Duration::from_secs(5), "missing").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Io { .. }));
}
