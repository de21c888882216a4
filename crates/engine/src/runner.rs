// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job runner: sequences provisioning, execution, artifact upload, and
//! status reporting for one job.
//!
//! Stage failures short-circuit the remaining execution stages, but the
//! terminal status report and workspace teardown run on every path. Status
//! and upload calls are best-effort: their failures are logged (and, for
//! uploads, surfaced in the reported output text) without changing the job's
//! own outcome.

use crate::command::{script_stages, toolchain_stages, CommandExecutor, ExecOutcome};
use crate::provision::{write_backend_override, write_credentials, ProvisionError, CLI_CONFIG_ENV};
use crate::toolchain::{ToolchainError, ToolchainResolver};
use crate::workspace::{Workspace, WorkspaceError, WorkspaceProvisioner};
use parking_lot::Mutex;
use quarry_adapters::logs::{LogSink, LogSinkFactory};
use quarry_adapters::token::TokenMinter;
use quarry_adapters::{ArtifactStore, ConsoleSinkFactory, StatusAdapter};
use quarry_core::{Config, Job, JobId};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors from a job run. Only execution-stage errors are returned;
/// best-effort reporting and upload problems never are.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("job {0} is already running")]
    AlreadyRunning(JobId),
    #[error("workspace setup failed: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("toolchain {version} unavailable: {source}")]
    Toolchain {
        version: String,
        #[source]
        source: ToolchainError,
    },
    #[error("environment provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("unknown job type")]
    UnknownJobType,
}

/// Collaborators injected into the runner at construction.
pub struct RunnerDeps {
    pub workspaces: Arc<dyn WorkspaceProvisioner>,
    pub toolchains: Arc<dyn ToolchainResolver>,
    pub executor: Arc<dyn CommandExecutor>,
    pub status: Arc<dyn StatusAdapter>,
    pub store: Arc<dyn ArtifactStore>,
    pub minter: Arc<dyn TokenMinter>,
    pub sinks: Arc<dyn LogSinkFactory>,
}

/// Executes jobs. One instance serves the whole process; each call to
/// [`JobRunner::run`] drives one job to a terminal state.
pub struct JobRunner {
    config: Arc<Config>,
    workspaces: Arc<dyn WorkspaceProvisioner>,
    toolchains: Arc<dyn ToolchainResolver>,
    executor: Arc<dyn CommandExecutor>,
    status: Arc<dyn StatusAdapter>,
    store: Arc<dyn ArtifactStore>,
    minter: Arc<dyn TokenMinter>,
    sinks: Arc<dyn LogSinkFactory>,
    /// Job ids currently executing in this process.
    active: Mutex<HashSet<String>>,
}

/// Removes the job id from the active set when the run ends, on every path.
struct ActiveGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}

impl JobRunner {
    pub fn new(config: Arc<Config>, deps: RunnerDeps) -> Self {
        Self {
            config,
            workspaces: deps.workspaces,
            toolchains: deps.toolchains,
            executor: deps.executor,
            status: deps.status,
            store: deps.store,
            minter: deps.minter,
            sinks: deps.sinks,
            active: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, id: &JobId) -> Result<ActiveGuard<'_>, RunError> {
        let mut active = self.active.lock();
        if !active.insert(id.to_string()) {
            return Err(RunError::AlreadyRunning(id.clone()));
        }
        Ok(ActiveGuard { active: &self.active, id: id.to_string() })
    }

    /// Run one job to a terminal state.
    pub async fn run(&self, mut job: Job) -> Result<(), RunError> {
        let _guard = self.claim(&job.job_id)?;
        tracing::info!(job_id = %job.job_id, kind = %job.kind, "processing job");

        if let Err(e) = self.status.report_running(&job).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "failed to report running status");
        }

        let workspace = match self.workspaces.setup(&job).await {
            Ok(workspace) => workspace,
            Err(e) => {
                // fatal: nothing was provisioned, nothing to tear down
                let err = RunError::Workspace(e);
                self.report_terminal(&job, false, &err.to_string()).await;
                return Err(err);
            }
        };

        let result = self.execute(&mut job, &workspace).await;

        let (success, output) = match &result {
            Ok(note) => (true, note.clone().unwrap_or_default()),
            Err(e) => (false, e.to_string()),
        };
        self.report_terminal(&job, success, &output).await;

        if let Err(e) = self.workspaces.teardown(&workspace).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "workspace teardown failed");
        }
        tracing::info!(job_id = %job.job_id, success, "job finished");

        result.map(|_| ())
    }

    /// Execution stages after workspace setup. On success, returns an
    /// optional note to surface in the reported output (artifact upload
    /// problems).
    async fn execute(
        &self,
        job: &mut Job,
        workspace: &Workspace,
    ) -> Result<Option<String>, RunError> {
        let mut sink = match self.sinks.open(job).await {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "log sink unavailable, falling back to stdout");
                match ConsoleSinkFactory.open(job).await {
                    Ok(sink) => sink,
                    Err(e) => return Err(RunError::Execution(e.to_string())),
                }
            }
        };

        let result = if job.kind.is_toolchain() {
            self.run_toolchain(job, workspace, sink.as_mut()).await
        } else if job.kind.is_script() {
            self.run_script(job, workspace, sink.as_mut()).await
        } else {
            Err(RunError::UnknownJobType)
        };

        if let Err(e) = sink.close().await {
            tracing::warn!(job_id = %job.job_id, error = %e, "log sink close failed");
        }
        result
    }

    async fn run_toolchain(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        sink: &mut dyn LogSink,
    ) -> Result<Option<String>, RunError> {
        let exec_path =
            self.toolchains.resolve(&job.terraform_version).await.map_err(|source| {
                RunError::Toolchain { version: job.terraform_version.clone(), source }
            })?;

        write_backend_override(&self.config, job, &workspace.workdir).await?;
        if let Some(credentials) =
            write_credentials(self.minter.as_ref(), &self.config, &workspace.workdir).await?
        {
            job.environment_variables
                .insert(CLI_CONFIG_ENV.to_string(), credentials.display().to_string());
        }

        let stages = toolchain_stages(job.kind, &exec_path);
        let outcome = self
            .executor
            .run(&stages, &workspace.workdir, &job.environment_variables, sink)
            .await
            .map_err(|e| RunError::Execution(e.to_string()))?;
        if !outcome.success {
            return Err(RunError::Execution(outcome.output));
        }

        Ok(self.upload_artifacts(job, workspace, &outcome).await)
    }

    async fn run_script(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        sink: &mut dyn LogSink,
    ) -> Result<Option<String>, RunError> {
        let stages = script_stages(&job.commands);
        let outcome = self
            .executor
            .run(&stages, &workspace.workdir, &job.environment_variables, sink)
            .await
            .map_err(|e| RunError::Execution(e.to_string()))?;
        if !outcome.success {
            return Err(RunError::Execution(outcome.output));
        }
        Ok(None)
    }

    /// Upload state and output after a successful toolchain run.
    ///
    /// Failures keep the job successful but are returned as a note so the
    /// degraded result is visible in the reported status instead of being
    /// silently dropped.
    async fn upload_artifacts(
        &self,
        job: &Job,
        workspace: &Workspace,
        outcome: &ExecOutcome,
    ) -> Option<String> {
        let mut notes = Vec::new();

        let state_path = workspace.workdir.join("terraform.tfstate");
        match tokio::fs::read(&state_path).await {
            Ok(bytes) => {
                let key = format!(
                    "tfstate/{}/{}/{}.tfstate",
                    job.organization_id, job.workspace_id, job.job_id
                );
                if let Err(e) = self.store.upload(&key, bytes).await {
                    tracing::warn!(job_id = %job.job_id, key = %key, error = %e, "state upload failed");
                    notes.push(format!("state upload failed: {e}"));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // remote-backend runs keep state on the coordinator side
                tracing::debug!(job_id = %job.job_id, "no local state file to upload");
            }
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "state file unreadable");
                notes.push(format!("state upload failed: {e}"));
            }
        }

        let key = format!(
            "tfoutput/{}/{}/{}.log",
            job.organization_id, job.workspace_id, job.job_id
        );
        if let Err(e) = self.store.upload(&key, outcome.output.clone().into_bytes()).await {
            tracing::warn!(job_id = %job.job_id, key = %key, error = %e, "output upload failed");
            notes.push(format!("output upload failed: {e}"));
        }

        if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        }
    }

    /// Report the step's terminal status, then the job's. Both best-effort.
    async fn report_terminal(&self, job: &Job, success: bool, output: &str) {
        if let Err(e) = self.status.report_step(job, success, output).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "failed to report step status");
        }
        if let Err(e) = self.status.report_job(job, success, output).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "failed to report job status");
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
