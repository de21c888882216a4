// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job execution workspaces.
//!
//! Each job gets a freshly created root directory with a shallow checkout of
//! its source repository, and the whole tree is removed when the run
//! finishes — on every exit path. Nothing on disk is shared between jobs.

use async_trait::async_trait;
use quarry_core::Job;
use quarry_adapters::subprocess::{run_with_timeout, SubprocessError, GIT_FETCH_TIMEOUT};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors from workspace provisioning.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source fetch failed: {output}")]
    Fetch { output: String },
    #[error("source fetch did not run: {0}")]
    FetchSpawn(#[from] SubprocessError),
}

/// Ephemeral filesystem scope bound 1:1 to a job.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Freshly created, job-unique root directory.
    pub root: PathBuf,
    /// Where commands execute: the root, or root/folder when the job names a
    /// subfolder. The subfolder is not validated here — a missing one
    /// surfaces later as an execution failure.
    pub workdir: PathBuf,
}

/// Creates and destroys per-job workspaces.
#[async_trait]
pub trait WorkspaceProvisioner: Send + Sync {
    /// Create the workspace and fetch the job's source into it.
    ///
    /// On failure nothing is left behind; there is no workspace to tear
    /// down.
    async fn setup(&self, job: &Job) -> Result<Workspace, WorkspaceError>;

    /// Recursively remove the workspace. Idempotent; succeeds when the root
    /// is already gone.
    async fn teardown(&self, workspace: &Workspace) -> Result<(), WorkspaceError>;
}

/// Real provisioner backed by `git clone`.
pub struct GitWorkspaces {
    parent: PathBuf,
}

impl GitWorkspaces {
    pub fn new(parent: PathBuf) -> Self {
        Self { parent }
    }
}

/// Fetch URL with the access token embedded, when the job carries one.
///
/// Only `https://` URLs get the `oauth2:<token>@` convention; anything else
/// is used unmodified.
fn fetch_url(source: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => match source.strip_prefix("https://") {
            Some(rest) => format!("https://oauth2:{token}@{rest}"),
            None => source.to_string(),
        },
        None => source.to_string(),
    }
}

#[async_trait]
impl WorkspaceProvisioner for GitWorkspaces {
    async fn setup(&self, job: &Job) -> Result<Workspace, WorkspaceError> {
        let root = self.parent.join(format!("quarry-job-{}-{}", job.job_id, Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;

        let url = fetch_url(&job.source, job.fetch_token());
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("clone").arg("--depth").arg("1").arg("--single-branch");
        if let Some(branch) = job.branch.as_deref().filter(|b| !b.is_empty()) {
            cmd.arg("--branch").arg(branch);
        }
        cmd.arg(&url).arg(&root);

        tracing::info!(job_id = %job.job_id, root = %root.display(), "fetching job source");
        let result = run_with_timeout(cmd, GIT_FETCH_TIMEOUT, "git clone").await;
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&root).await;
                return Err(e.into());
            }
        };
        if !output.status.success() {
            let _ = tokio::fs::remove_dir_all(&root).await;
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(WorkspaceError::Fetch { output: combined.trim().to_string() });
        }

        let workdir = match job.folder.as_deref().filter(|f| !f.is_empty()) {
            Some(folder) => root.join(folder),
            None => root.clone(),
        };
        Ok(Workspace { root, workdir })
    }

    async fn teardown(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        match tokio::fs::remove_dir_all(&workspace.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
