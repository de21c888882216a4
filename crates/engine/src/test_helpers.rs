// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake engine components for orchestration tests.
//!
//! The fakes record every interaction behind `Arc<Mutex<_>>` so tests can
//! assert call counts and ordering, and support forced failures at each
//! stage.

use crate::command::{CommandExecutor, ExecError, ExecOutcome, ExecSpec};
use crate::toolchain::{ToolchainError, ToolchainResolver};
use crate::workspace::{Workspace, WorkspaceError, WorkspaceProvisioner};
use async_trait::async_trait;
use parking_lot::Mutex;
use quarry_adapters::logs::LogSink;
use quarry_core::Job;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct FakeWorkspacesState {
    setups: u32,
    teardowns: u32,
    fail_setup: Option<String>,
}

/// Workspace provisioner creating real (empty) temp directories and counting
/// setup/teardown calls.
#[derive(Clone)]
pub struct FakeWorkspaces {
    base: PathBuf,
    inner: Arc<Mutex<FakeWorkspacesState>>,
}

impl Default for FakeWorkspaces {
    fn default() -> Self {
        Self {
            base: std::env::temp_dir().join(format!("quarry-fake-{}", Uuid::new_v4())),
            inner: Arc::new(Mutex::new(FakeWorkspacesState {
                setups: 0,
                teardowns: 0,
                fail_setup: None,
            })),
        }
    }
}

impl FakeWorkspaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent setup fail with the given fetch output.
    pub fn fail_setup(&self, output: impl Into<String>) {
        self.inner.lock().fail_setup = Some(output.into());
    }

    pub fn setups(&self) -> u32 {
        self.inner.lock().setups
    }

    pub fn teardowns(&self) -> u32 {
        self.inner.lock().teardowns
    }
}

#[async_trait]
impl WorkspaceProvisioner for FakeWorkspaces {
    async fn setup(&self, job: &Job) -> Result<Workspace, WorkspaceError> {
        let fail = {
            let mut state = self.inner.lock();
            state.setups += 1;
            state.fail_setup.clone()
        };
        if let Some(output) = fail {
            return Err(WorkspaceError::Fetch { output });
        }
        let root = self.base.join(format!("{}-{}", job.job_id, Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;
        Ok(Workspace { root: root.clone(), workdir: root })
    }

    async fn teardown(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        self.inner.lock().teardowns += 1;
        let _ = tokio::fs::remove_dir_all(&workspace.root).await;
        Ok(())
    }
}

struct FakeResolverState {
    calls: Vec<String>,
    fail: bool,
}

/// Resolver returning a fixed path without installing anything.
#[derive(Clone)]
pub struct FakeResolver {
    path: PathBuf,
    inner: Arc<Mutex<FakeResolverState>>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/opt/quarry-test/terraform"),
            inner: Arc::new(Mutex::new(FakeResolverState { calls: Vec::new(), fail: false })),
        }
    }
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.inner.lock().fail = true;
    }

    /// Versions resolved so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl ToolchainResolver for FakeResolver {
    async fn resolve(&self, version: &str) -> Result<PathBuf, ToolchainError> {
        let mut state = self.inner.lock();
        state.calls.push(version.to_string());
        if state.fail {
            return Err(ToolchainError::Download {
                url: format!("test://{version}"),
                reason: "forced resolution failure".to_string(),
            });
        }
        Ok(self.path.clone())
    }
}

/// One recorded executor invocation.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub labels: Vec<String>,
    pub programs: Vec<PathBuf>,
    pub workdir: PathBuf,
    pub env: HashMap<String, String>,
}

struct FakeExecutorState {
    runs: Vec<RecordedRun>,
    success: bool,
    output: String,
    delay: Duration,
    write_file: Option<(String, Vec<u8>)>,
}

/// Executor recording invocations instead of spawning processes.
#[derive(Clone)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeExecutorState>>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeExecutorState {
                runs: Vec::new(),
                success: true,
                output: "fake output\n".to_string(),
                delay: Duration::ZERO,
                write_file: None,
            })),
        }
    }
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent run report a non-zero exit with this output.
    pub fn fail_all(&self, output: impl Into<String>) {
        let mut state = self.inner.lock();
        state.success = false;
        state.output = output.into();
    }

    /// Delay each run, to widen windows in concurrency tests.
    pub fn delay(&self, delay: Duration) {
        self.inner.lock().delay = delay;
    }

    /// Drop a file into the working directory during each run, the way a
    /// real toolchain invocation leaves state behind.
    pub fn write_file(&self, name: impl Into<String>, content: &[u8]) {
        self.inner.lock().write_file = Some((name.into(), content.to_vec()));
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.inner.lock().runs.clone()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(
        &self,
        stages: &[ExecSpec],
        workdir: &Path,
        env: &HashMap<String, String>,
        sink: &mut dyn LogSink,
    ) -> Result<ExecOutcome, ExecError> {
        let (outcome, delay, write_file) = {
            let mut state = self.inner.lock();
            state.runs.push(RecordedRun {
                labels: stages.iter().map(|s| s.label.clone()).collect(),
                programs: stages.iter().map(|s| s.program.clone()).collect(),
                workdir: workdir.to_path_buf(),
                env: env.clone(),
            });
            (
                ExecOutcome { success: state.success, output: state.output.clone() },
                state.delay,
                state.write_file.clone(),
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some((name, content)) = write_file {
            let _ = tokio::fs::write(workdir.join(name), content).await;
        }
        let _ = sink.write(outcome.output.as_bytes()).await;
        Ok(outcome)
    }
}
