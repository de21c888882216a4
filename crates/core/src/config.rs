// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration, loaded once at startup from `QUARRY_*` environment
//! variables. Anything missing or invalid here is fatal to the process, not
//! to an individual job.

use crate::job::Job;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BATCH mode selected but QUARRY_JOB_DATA is empty")]
    MissingJobData,
    #[error("invalid QUARRY_JOB_DATA: {0}")]
    InvalidJobData(String),
    #[error("unknown storage type: {0}")]
    UnknownStorageType(String),
    #[error("storage type LOCAL requires QUARRY_STORAGE_ROOT")]
    MissingStorageRoot,
    #[error("storage type REMOTE requires QUARRY_STORAGE_ENDPOINT")]
    MissingStorageEndpoint,
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Process lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Long-lived HTTP-triggered service, many jobs over time.
    Online,
    /// Single-shot process executing one configured job, then exiting.
    Batch,
}

crate::simple_display! {
    Mode {
        Online => "ONLINE",
        Batch => "BATCH",
    }
}

/// Artifact storage backend selection (closed set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Filesystem store rooted at a directory.
    Local { root: PathBuf },
    /// HTTP object gateway with optional bearer auth.
    Remote { endpoint: String, token: Option<String> },
    /// Uploads are discarded, downloads fail.
    None,
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    /// ONLINE listen port.
    pub port: u16,
    /// Coordinator API base URL. Without it, status reporting is log-only
    /// and no backend override is generated.
    pub api_url: Option<String>,
    /// Module registry domain included in the credential host map.
    pub registry_domain: Option<String>,
    /// Shared secret used to mint coordinator bearer tokens.
    pub internal_secret: Option<String>,
    pub storage: StorageConfig,
    /// Root directory of the shared toolchain cache.
    pub toolchain_dir: PathBuf,
    /// Base URL toolchain releases are downloaded from.
    pub release_url: String,
    /// Parent directory for per-job workspaces.
    pub workspace_dir: PathBuf,
    /// Maximum concurrently executing jobs (ONLINE admission control).
    pub max_jobs: usize,
    /// Timeout applied to each execution stage.
    pub stage_timeout: Duration,
    /// When set, job logs stream to this redis instance instead of stdout.
    pub redis_url: Option<String>,
    /// The single job to execute in BATCH mode.
    pub batch_job: Option<Job>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get_nonempty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let mode = match get_nonempty("QUARRY_MODE") {
            Some(v) if v.eq_ignore_ascii_case("batch") => Mode::Batch,
            _ => Mode::Online,
        };

        let port = match get_nonempty("PORT") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: v })?,
            None => 8080,
        };

        let storage = match get_nonempty("QUARRY_STORAGE_TYPE") {
            Some(v) if v.eq_ignore_ascii_case("local") => StorageConfig::Local {
                root: get_nonempty("QUARRY_STORAGE_ROOT")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingStorageRoot)?,
            },
            Some(v) if v.eq_ignore_ascii_case("remote") => StorageConfig::Remote {
                endpoint: get_nonempty("QUARRY_STORAGE_ENDPOINT")
                    .ok_or(ConfigError::MissingStorageEndpoint)?,
                token: get_nonempty("QUARRY_STORAGE_TOKEN"),
            },
            Some(v) if v.eq_ignore_ascii_case("none") => StorageConfig::None,
            Some(v) => return Err(ConfigError::UnknownStorageType(v)),
            None => StorageConfig::None,
        };

        let toolchain_dir = get_nonempty("QUARRY_TOOLCHAIN_DIR").map(PathBuf::from).unwrap_or_else(
            || {
                dirs::cache_dir()
                    .unwrap_or_else(std::env::temp_dir)
                    .join("quarry")
                    .join("toolchains")
            },
        );

        let workspace_dir = get_nonempty("QUARRY_WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let max_jobs = match get_nonempty("QUARRY_MAX_JOBS") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidValue { key: "QUARRY_MAX_JOBS", value: v }),
            },
            None => 4,
        };

        let stage_timeout = match get_nonempty("QUARRY_STAGE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue { key: "QUARRY_STAGE_TIMEOUT_SECS", value: v }
            })?),
            None => Duration::from_secs(3600),
        };

        let batch_job = if mode == Mode::Batch {
            let raw = get_nonempty("QUARRY_JOB_DATA").ok_or(ConfigError::MissingJobData)?;
            Some(decode_job(&raw)?)
        } else {
            None
        };

        Ok(Self {
            mode,
            port,
            api_url: get_nonempty("QUARRY_API_URL"),
            registry_domain: get_nonempty("QUARRY_REGISTRY_DOMAIN"),
            internal_secret: get_nonempty("QUARRY_INTERNAL_SECRET"),
            storage,
            toolchain_dir,
            release_url: get_nonempty("QUARRY_RELEASE_URL")
                .unwrap_or_else(|| "https://releases.hashicorp.com".to_string()),
            workspace_dir,
            max_jobs,
            stage_timeout,
            redis_url: get_nonempty("QUARRY_REDIS_URL"),
            batch_job,
        })
    }
}

/// Decode the base64-encoded JSON job payload used in BATCH mode.
fn decode_job(raw: &str) -> Result<Job, ConfigError> {
    let bytes = BASE64_STANDARD
        .decode(raw.trim())
        .map_err(|e| ConfigError::InvalidJobData(format!("base64 decode failed: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ConfigError::InvalidJobData(format!("json decode failed: {e}")))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
