// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ONLINE mode: HTTP job submission.
//!
//! One POST endpoint accepts a job descriptor and acknowledges immediately
//! once the job is dispatched — execution continues asynchronously and the
//! outcome travels through the status reporter, never the HTTP response.
//! Dispatch is admission-controlled by a semaphore so a submission burst
//! queues instead of exhausting the process.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use quarry_core::Job;
use quarry_engine::JobRunner;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors from the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    runner: Arc<JobRunner>,
    permits: Arc<Semaphore>,
}

/// Build the router for the submission API.
pub fn router(runner: Arc<JobRunner>, max_jobs: usize) -> Router {
    let state = AppState { runner, permits: Arc::new(Semaphore::new(max_jobs)) };
    Router::new()
        .route("/api/v1/terraform-rs", post(submit))
        .route("/healthz", get(health))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(port: u16, runner: Arc<JobRunner>, max_jobs: usize) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| ServerError::Bind { port, source })?;
    tracing::info!(port, "listening for job submissions");
    axum::serve(listener, router(runner, max_jobs)).await?;
    Ok(())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Accept a job and dispatch it. The 202 acknowledgment only means the job
/// was queued; callers watch the coordinator for the outcome.
async fn submit(State(state): State<AppState>, Json(job): Json<Job>) -> (StatusCode, Json<Job>) {
    tracing::info!(job_id = %job.job_id, kind = %job.kind, "job submitted");

    let runner = Arc::clone(&state.runner);
    let permits = Arc::clone(&state.permits);
    let dispatched = job.clone();
    tokio::spawn(async move {
        let _permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed: the process is shutting down
        };
        if let Err(e) = runner.run(dispatched).await {
            tracing::error!(error = %e, "job execution failed");
        }
    });

    (StatusCode::ACCEPTED, Json(job))
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
