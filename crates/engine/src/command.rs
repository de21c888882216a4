// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Staged command execution with live output streaming.
//!
//! A job's work is a short sequence of stages (toolchain: initialize, then
//! the verb; scripts: one stage per fragment). Combined stdout/stderr bytes
//! are forwarded to the job's log sink as they are produced, not buffered
//! until completion, which is what makes live log following possible. A
//! bounded tail is kept for the terminal status report, and a non-zero exit
//! aborts the remaining stages.

use async_trait::async_trait;
use quarry_adapters::logs::LogSink;
use quarry_core::JobKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

/// Upper bound on output retained for status reporting. Full logs travel
/// through the log sink; this tail only feeds the terminal status text.
pub const MAX_OUTPUT_BYTES: usize = 16 * 1024;

/// Errors from command execution (the process could not be run; a process
/// that ran and exited non-zero is a failed [`ExecOutcome`], not an error).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{label} failed to spawn: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label} timed out after {timeout:?}")]
    Timeout { label: String, timeout: Duration },
    #[error("{label} wait failed: {source}")]
    Wait {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    /// Short human-readable stage name for logs and error text.
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ExecSpec {
    pub fn new(label: impl Into<String>, program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Terminal result of running a job's stages.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// True iff every stage exited with status zero.
    pub success: bool,
    /// Bounded tail of the combined output.
    pub output: String,
}

/// Toolchain stage sequence for a job kind. Initialization always precedes
/// the verb; apply/destroy run non-interactively.
pub fn toolchain_stages(kind: JobKind, exec_path: &Path) -> Vec<ExecSpec> {
    let init = ExecSpec::new("terraform init", exec_path, &["init", "-input=false", "-no-color"]);
    let verb = match kind {
        JobKind::Plan => {
            ExecSpec::new("terraform plan", exec_path, &["plan", "-input=false", "-no-color"])
        }
        JobKind::Apply => ExecSpec::new(
            "terraform apply",
            exec_path,
            &["apply", "-input=false", "-no-color", "-auto-approve"],
        ),
        JobKind::Destroy => ExecSpec::new(
            "terraform destroy",
            exec_path,
            &["destroy", "-input=false", "-no-color", "-auto-approve"],
        ),
        // non-toolchain kinds never reach here; returning just init keeps
        // the function total without panicking
        _ => return vec![init],
    };
    vec![init, verb]
}

/// Script stage sequence: each fragment runs under bash with fail-fast
/// shell options.
pub fn script_stages(commands: &[String]) -> Vec<ExecSpec> {
    commands
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            let wrapped = format!("set -euo pipefail\n{fragment}");
            ExecSpec {
                label: format!("script {}", i + 1),
                program: PathBuf::from("bash"),
                args: vec!["-c".to_string(), wrapped],
            }
        })
        .collect()
}

/// Runs a stage sequence to a terminal outcome.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(
        &self,
        stages: &[ExecSpec],
        workdir: &Path,
        env: &HashMap<String, String>,
        sink: &mut dyn LogSink,
    ) -> Result<ExecOutcome, ExecError>;
}

/// Real executor spawning external processes.
pub struct ProcessExecutor {
    stage_timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(stage_timeout: Duration) -> Self {
        Self { stage_timeout }
    }

    async fn run_stage(
        &self,
        spec: &ExecSpec,
        workdir: &Path,
        env: &HashMap<String, String>,
        sink: &mut dyn LogSink,
        tail: &mut OutputTail,
    ) -> Result<i32, ExecError> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(workdir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            label: spec.label.clone(),
            source,
        })?;

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(16);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx.clone()));
        }
        drop(tx);

        let stage = async {
            while let Some(chunk) = rx.recv().await {
                tail.push(&chunk);
                if let Err(e) = sink.write(&chunk).await {
                    tracing::warn!(stage = %spec.label, error = %e, "log sink write failed");
                }
            }
            child.wait().await
        };

        // the child is killed on drop if the timeout wins
        let status = match tokio::time::timeout(self.stage_timeout, stage).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ExecError::Wait { label: spec.label.clone(), source })
            }
            Err(_) => {
                return Err(ExecError::Timeout {
                    label: spec.label.clone(),
                    timeout: self.stage_timeout,
                })
            }
        };

        Ok(status.code().unwrap_or(-1))
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(
        &self,
        stages: &[ExecSpec],
        workdir: &Path,
        env: &HashMap<String, String>,
        sink: &mut dyn LogSink,
    ) -> Result<ExecOutcome, ExecError> {
        let mut tail = OutputTail::new(MAX_OUTPUT_BYTES);

        for spec in stages {
            tracing::info!(stage = %spec.label, workdir = %workdir.display(), "running stage");
            let banner = format!("==> {}\n", spec.label);
            if let Err(e) = sink.write(banner.as_bytes()).await {
                tracing::warn!(stage = %spec.label, error = %e, "log sink write failed");
            }

            let start = std::time::Instant::now();
            let exit_code = self.run_stage(spec, workdir, env, sink, &mut tail).await?;
            tracing::info!(
                stage = %spec.label,
                exit_code,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "stage finished"
            );

            if exit_code != 0 {
                let note = format!("\n{} exited with status {}\n", spec.label, exit_code);
                tail.push(note.as_bytes());
                return Ok(ExecOutcome { success: false, output: tail.render() });
            }
        }

        Ok(ExecOutcome { success: true, output: tail.render() })
    }
}

/// Forward reader chunks into the channel until EOF.
async fn pump(mut reader: impl AsyncReadExt + Unpin, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Keeps the last `cap` bytes of a stream, remembering whether anything was
/// dropped.
pub(crate) struct OutputTail {
    cap: usize,
    buf: Vec<u8>,
    truncated: bool,
}

impl OutputTail {
    pub(crate) fn new(cap: usize) -> Self {
        Self { cap, buf: Vec::new(), truncated: false }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > self.cap {
            let excess = self.buf.len() - self.cap;
            self.buf.drain(..excess);
            self.truncated = true;
        }
    }

    pub(crate) fn render(&self) -> String {
        let mut start = 0;
        // drop a partial UTF-8 sequence left at the front by truncation
        while start < self.buf.len() && (self.buf[start] & 0xC0) == 0x80 {
            start += 1;
        }
        let text = String::from_utf8_lossy(&self.buf[start..]);
        if self.truncated {
            format!("[output truncated]\n{text}")
        } else {
            text.into_owned()
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
