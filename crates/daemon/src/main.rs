// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! quarryd: job-execution agent for the coordinator.

use quarry_core::{Config, Mode};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "configuration invalid");
            return ExitCode::from(2);
        }
    };

    let runner = match quarry_daemon::build_runner(&config) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::from(2);
        }
    };

    tracing::info!(mode = %config.mode, "quarryd starting");
    match config.mode {
        Mode::Batch => {
            let Some(job) = config.batch_job.clone() else {
                tracing::error!("BATCH mode without a job payload");
                return ExitCode::from(2);
            };
            match quarry_daemon::batch::run(&runner, job).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            }
        }
        Mode::Online => {
            match quarry_daemon::server::serve(config.port, runner, config.max_jobs).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "server failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
