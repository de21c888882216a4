// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator status reporting.
//!
//! Every report is an independent best-effort network call: the runner logs
//! failures and keeps going. The coordinator reconciles missing or stale
//! status on its own.

use async_trait::async_trait;
use quarry_core::{Job, JobStatus};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors from status reporting.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("coordinator returned status {0}")]
    Unexpected(u16),
}

/// Adapter for reporting job and step status to the coordinator.
#[async_trait]
pub trait StatusAdapter: Send + Sync {
    /// Mark the job as running.
    async fn report_running(&self, job: &Job) -> Result<(), StatusError>;

    /// Report the step's terminal status with its output text.
    async fn report_step(&self, job: &Job, success: bool, output: &str)
        -> Result<(), StatusError>;

    /// Report the job's terminal status.
    async fn report_job(&self, job: &Job, success: bool, output: &str) -> Result<(), StatusError>;
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: JobStatus,
    output: &'a str,
}

/// Status adapter talking to the coordinator's HTTP API.
pub struct HttpStatusAdapter {
    base: String,
    client: reqwest::Client,
}

impl HttpStatusAdapter {
    pub fn new(api_url: &str) -> Result<Self, StatusError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { base: api_url.trim_end_matches('/').to_string(), client })
    }

    fn job_url(&self, job: &Job) -> String {
        format!(
            "{}/api/v1/organizations/{}/jobs/{}",
            self.base, job.organization_id, job.job_id
        )
    }

    async fn patch(&self, url: String, body: StatusBody<'_>) -> Result<(), StatusError> {
        let resp = self.client.patch(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(StatusError::Unexpected(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusAdapter for HttpStatusAdapter {
    async fn report_running(&self, job: &Job) -> Result<(), StatusError> {
        self.patch(self.job_url(job), StatusBody { status: JobStatus::Running, output: "" }).await
    }

    async fn report_step(
        &self,
        job: &Job,
        success: bool,
        output: &str,
    ) -> Result<(), StatusError> {
        let url = format!("{}/steps/{}", self.job_url(job), job.step_id);
        self.patch(url, StatusBody { status: JobStatus::terminal(success), output }).await
    }

    // output travels on the step update; the job-level record only carries
    // the status itself
    async fn report_job(&self, job: &Job, success: bool, _output: &str) -> Result<(), StatusError> {
        self.patch(self.job_url(job), StatusBody { status: JobStatus::terminal(success), output: "" })
            .await
    }
}

/// Fallback adapter used when no coordinator API URL is configured:
/// status transitions are only logged locally.
#[derive(Default)]
pub struct LogStatusAdapter;

#[async_trait]
impl StatusAdapter for LogStatusAdapter {
    async fn report_running(&self, job: &Job) -> Result<(), StatusError> {
        tracing::info!(job_id = %job.job_id, status = %JobStatus::Running, "job status");
        Ok(())
    }

    async fn report_step(
        &self,
        job: &Job,
        success: bool,
        output: &str,
    ) -> Result<(), StatusError> {
        tracing::info!(
            job_id = %job.job_id,
            step_id = %job.step_id,
            status = %JobStatus::terminal(success),
            output,
            "step status"
        );
        Ok(())
    }

    async fn report_job(&self, job: &Job, success: bool, _output: &str) -> Result<(), StatusError> {
        tracing::info!(job_id = %job.job_id, status = %JobStatus::terminal(success), "job status");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{StatusAdapter, StatusError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use quarry_core::Job;
    use std::sync::Arc;

    /// Recorded status report.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StatusCall {
        Running { job_id: String },
        Step { job_id: String, success: bool, output: String },
        Job { job_id: String, success: bool },
    }

    struct FakeStatusState {
        calls: Vec<StatusCall>,
        fail: bool,
    }

    /// Fake status adapter recording every report.
    #[derive(Clone)]
    pub struct FakeStatusAdapter {
        inner: Arc<Mutex<FakeStatusState>>,
    }

    impl Default for FakeStatusAdapter {
        fn default() -> Self {
            Self { inner: Arc::new(Mutex::new(FakeStatusState { calls: Vec::new(), fail: false })) }
        }
    }

    impl FakeStatusAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent report fail.
        pub fn fail_all(&self) {
            self.inner.lock().fail = true;
        }

        /// Get all recorded reports, in order.
        pub fn calls(&self) -> Vec<StatusCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl StatusAdapter for FakeStatusAdapter {
        async fn report_running(&self, job: &Job) -> Result<(), StatusError> {
            let mut state = self.inner.lock();
            state.calls.push(StatusCall::Running { job_id: job.job_id.to_string() });
            if state.fail {
                return Err(StatusError::Unexpected(503));
            }
            Ok(())
        }

        async fn report_step(
            &self,
            job: &Job,
            success: bool,
            output: &str,
        ) -> Result<(), StatusError> {
            let mut state = self.inner.lock();
            state.calls.push(StatusCall::Step {
                job_id: job.job_id.to_string(),
                success,
                output: output.to_string(),
            });
            if state.fail {
                return Err(StatusError::Unexpected(503));
            }
            Ok(())
        }

        async fn report_job(
            &self,
            job: &Job,
            success: bool,
            _output: &str,
        ) -> Result<(), StatusError> {
            let mut state = self.inner.lock();
            state.calls.push(StatusCall::Job { job_id: job.job_id.to_string(), success });
            if state.fail {
                return Err(StatusError::Unexpected(503));
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStatusAdapter, StatusCall};

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
