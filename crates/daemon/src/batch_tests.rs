// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use quarry_adapters::{FakeStatusAdapter, FakeStore, FakeTokenMinter, MemorySinkFactory};
use quarry_core::JobKind;
use quarry_engine::test_helpers::{FakeExecutor, FakeResolver, FakeWorkspaces};
use quarry_engine::RunnerDeps;
use std::sync::Arc;

fn test_runner() -> (JobRunner, FakeExecutor) {
    let config = quarry_core::Config::from_lookup(&|_: &str| None).unwrap();
    let executor = FakeExecutor::new();
    let runner = JobRunner::new(
        Arc::new(config),
        RunnerDeps {
            workspaces: Arc::new(FakeWorkspaces::new()),
            toolchains: Arc::new(FakeResolver::new()),
            executor: Arc::new(executor.clone()),
            status: Arc::new(FakeStatusAdapter::new()),
            store: Arc::new(FakeStore::new()),
            minter: Arc::new(FakeTokenMinter::failing()),
            sinks: Arc::new(MemorySinkFactory::new()),
        },
    );
    (runner, executor)
}

#[tokio::test]
async fn successful_job_returns_ok() {
    let (runner, _) = test_runner();
    let job = Job::builder().kind(JobKind::CustomScript).commands(vec!["true".into()]).build();
    run(&runner, job).await.unwrap();
}

#[tokio::test]
async fn failed_job_returns_the_error() {
    let (runner, executor) = test_runner();
    executor.fail_all("script blew up");
    let job = Job::builder().kind(JobKind::CustomScript).commands(vec!["false".into()]).build();
    let err = run(&runner, job).await.unwrap_err();
    assert!(matches!(err, RunError::Execution(_)));
}
