// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter construction and runner assembly.

use quarry_adapters::logs::LogSinkFactory;
use quarry_adapters::status::StatusAdapter;
use quarry_adapters::{
    new_store, ConsoleSinkFactory, HttpStatusAdapter, LogError, LogStatusAdapter,
    RedisSinkFactory, SecretTokenMinter, StatusError, StoreError,
};
use quarry_core::Config;
use quarry_engine::{
    GitWorkspaces, JobRunner, ProcessExecutor, ReleaseInstaller, RunnerDeps, ToolchainCache,
    ToolchainError,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors from process assembly. All fatal at startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("status client: {0}")]
    Status(#[from] StatusError),
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),
    #[error("toolchain installer: {0}")]
    Toolchain(#[from] ToolchainError),
    #[error("log transport: {0}")]
    Logs(#[from] LogError),
}

/// Build the runner from configuration, constructing every collaborator.
///
/// The toolchain cache is owned here and injected, so "installed once,
/// shared read-only" holds for the life of the process.
pub fn build_runner(config: &Arc<Config>) -> Result<Arc<JobRunner>, BootstrapError> {
    let status: Arc<dyn StatusAdapter> = match config.api_url.as_deref() {
        Some(api_url) => Arc::new(HttpStatusAdapter::new(api_url)?),
        None => {
            tracing::warn!("no coordinator api url configured, status reporting is log-only");
            Arc::new(LogStatusAdapter)
        }
    };

    let sinks: Arc<dyn LogSinkFactory> = match config.redis_url.as_deref() {
        Some(url) => Arc::new(RedisSinkFactory::new(url)?),
        None => Arc::new(ConsoleSinkFactory),
    };

    let installer = ReleaseInstaller::new(&config.release_url)?;
    let toolchains =
        Arc::new(ToolchainCache::new(config.toolchain_dir.clone(), Box::new(installer)));

    let runner = JobRunner::new(
        Arc::clone(config),
        RunnerDeps {
            workspaces: Arc::new(GitWorkspaces::new(config.workspace_dir.clone())),
            toolchains,
            executor: Arc::new(ProcessExecutor::new(config.stage_timeout)),
            status,
            store: new_store(&config.storage)?,
            minter: Arc::new(SecretTokenMinter::new(config.internal_secret.clone())),
            sinks,
        },
    );
    Ok(Arc::new(runner))
}
