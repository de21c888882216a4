// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend-override and credential artifacts.
//!
//! Both files are written into the job's working directory before the
//! toolchain runs and disappear with the rest of the workspace at teardown.
//! The override points the toolchain's state backend at the coordinator; the
//! credentials file lets it authenticate against the coordinator's registry
//! and API hosts.

use quarry_adapters::token::TokenMinter;
use quarry_core::{hostname, Config, Job};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Backend override fragment written next to the job's configuration.
pub const OVERRIDE_FILE: &str = "quarry_override.tf";
/// Credential file in the toolchain's JSON host-map format.
pub const CREDENTIALS_FILE: &str = "credentials.tfrc.json";
/// Environment variable the toolchain reads to locate its CLI config.
pub const CLI_CONFIG_ENV: &str = "TF_CLI_CONFIG_FILE";

/// Errors from environment provisioning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid coordinator api url: {0:?}")]
    InvalidApiUrl(String),
    #[error("failed to write {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

async fn write_file(workdir: &Path, name: &str, content: String) -> Result<PathBuf, ProvisionError> {
    let path = workdir.join(name);
    tokio::fs::write(&path, content)
        .await
        .map_err(|source| ProvisionError::Write { file: name.to_string(), source })?;
    Ok(path)
}

/// Write the backend override redirecting state to the coordinator.
///
/// Skipped entirely when no API URL is configured. A configured URL that
/// yields no hostname is a hard failure.
pub async fn write_backend_override(
    config: &Config,
    job: &Job,
    workdir: &Path,
) -> Result<Option<PathBuf>, ProvisionError> {
    let Some(api_url) = config.api_url.as_deref() else {
        return Ok(None);
    };
    let host =
        hostname(api_url).ok_or_else(|| ProvisionError::InvalidApiUrl(api_url.to_string()))?;

    let content = format!(
        r#"terraform {{
  backend "remote" {{
    hostname     = "{host}"
    organization = "{org}"
    workspaces {{
      name = "{workspace}"
    }}
  }}
}}
"#,
        org = job.organization_id,
        workspace = job.workspace_id,
    );

    let path = write_file(workdir, OVERRIDE_FILE, content).await?;
    tracing::debug!(job_id = %job.job_id, host = %host, "backend override written");
    Ok(Some(path))
}

/// Write the host→token credential map, when a token can be minted.
///
/// No token, or no hosts to map, is not an error: the file is skipped and
/// toolchain calls that need auth fail downstream instead.
pub async fn write_credentials(
    minter: &dyn TokenMinter,
    config: &Config,
    workdir: &Path,
) -> Result<Option<PathBuf>, ProvisionError> {
    let token = match minter.mint() {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "token minting failed, skipping credentials file");
            return Ok(None);
        }
    };

    let mut hosts: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    if let Some(registry) = config.registry_domain.as_deref().and_then(hostname) {
        hosts.insert(registry, serde_json::json!({ "token": token }));
    }
    if let Some(api_host) = config.api_url.as_deref().and_then(hostname) {
        hosts.entry(api_host).or_insert_with(|| serde_json::json!({ "token": token }));
    }
    if hosts.is_empty() {
        tracing::debug!("no credential hosts configured, skipping credentials file");
        return Ok(None);
    }

    let doc = serde_json::json!({ "credentials": hosts });
    let content = format!("{:#}\n", doc);
    let path = write_file(workdir, CREDENTIALS_FILE, content).await?;
    tracing::debug!(hosts = hosts_len(&doc), "credentials file written");
    Ok(Some(path))
}

fn hosts_len(doc: &serde_json::Value) -> usize {
    doc.get("credentials").and_then(|c| c.as_object()).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
