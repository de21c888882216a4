// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helper for short-lived subprocess invocations (git fetch, archive
//! extraction) that must not hang the job forever.

use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Timeout for source fetches.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);
/// Timeout for archive extraction.
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from subprocess helpers.
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label} timed out after {timeout:?}")]
    TimedOut { label: String, timeout: Duration },
    #[error("{label} failed to run: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command to completion, capturing combined output, bounded by a
/// timeout. The child is killed if the timeout fires.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, SubprocessError> {
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Io { label: label.to_string(), source }),
        Err(_) => Err(SubprocessError::TimedOut { label: label.to_string(), timeout }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
