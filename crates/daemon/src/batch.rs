// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! BATCH mode: execute the single configured job and report how it went.
//! The binary exits non-zero when the job fails.

use quarry_core::Job;
use quarry_engine::{JobRunner, RunError};

pub async fn run(runner: &JobRunner, job: Job) -> Result<(), RunError> {
    let job_id = job.job_id.clone();
    tracing::info!(job_id = %job_id, "starting batch execution");
    let result = runner.run(job).await;
    match &result {
        Ok(()) => tracing::info!(job_id = %job_id, "batch execution finished"),
        Err(e) => tracing::error!(job_id = %job_id, error = %e, "batch execution failed"),
    }
    result
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
