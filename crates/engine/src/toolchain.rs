// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Toolchain version resolution and the shared install cache.
//!
//! Many jobs can request the same version at the same time (ONLINE mode fans
//! out one task per submission), so installation is guarded by a per-version
//! async lock: concurrent first requests for one version block on, and
//! reuse, a single install, while unrelated versions proceed in parallel.
//!
//! Installs publish atomically: everything happens in a hidden temp
//! directory and only a fully verified install is renamed into place, so a
//! failed or interrupted install is never visible to other resolvers.

use async_trait::async_trait;
use futures_util::StreamExt;
use quarry_adapters::subprocess::{run_with_timeout, EXTRACT_TIMEOUT};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Name of the toolchain binary inside an installed version directory.
const BIN_NAME: &str = "terraform";

/// Errors from toolchain resolution.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("invalid toolchain version: {0:?}")]
    InvalidVersion(String),
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: &'static str, arch: &'static str },
    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("checksum mismatch for {file}")]
    ChecksumMismatch { file: String },
    #[error("extraction failed: {0}")]
    Extract(String),
    #[error("install io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps a requested version string to a locally usable executable path.
#[async_trait]
pub trait ToolchainResolver: Send + Sync {
    async fn resolve(&self, version: &str) -> Result<PathBuf, ToolchainError>;
}

/// Performs the actual install of one version into a destination directory.
///
/// Split out from the cache so the cache's concurrency contract is testable
/// without touching the network.
#[async_trait]
pub trait ToolchainInstaller: Send + Sync {
    /// Install `version` under `dest` and return the executable path.
    async fn install(&self, version: &str, dest: &Path) -> Result<PathBuf, ToolchainError>;
}

/// Process-wide cache of installed toolchain versions.
///
/// Owned by the daemon and handed to the runner at construction; versions
/// are installed at most once and shared read-only afterwards.
pub struct ToolchainCache {
    cache_dir: PathBuf,
    installer: Box<dyn ToolchainInstaller>,
    installed: parking_lot::RwLock<HashMap<String, PathBuf>>,
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ToolchainCache {
    pub fn new(cache_dir: PathBuf, installer: Box<dyn ToolchainInstaller>) -> Self {
        Self {
            cache_dir,
            installer,
            installed: parking_lot::RwLock::new(HashMap::new()),
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn version_lock(&self, version: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(version.to_string()).or_default())
    }
}

/// Version strings land in filesystem paths and release URLs; anything
/// outside a conservative character set is rejected up front.
fn validate_version(version: &str) -> Result<(), ToolchainError> {
    let valid = !version.is_empty()
        && version.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(ToolchainError::InvalidVersion(version.to_string()))
    }
}

#[async_trait]
impl ToolchainResolver for ToolchainCache {
    async fn resolve(&self, version: &str) -> Result<PathBuf, ToolchainError> {
        validate_version(version)?;

        if let Some(path) = self.installed.read().get(version) {
            return Ok(path.clone());
        }

        let lock = self.version_lock(version);
        let _guard = lock.lock().await;

        // another task may have finished the install while we waited
        if let Some(path) = self.installed.read().get(version) {
            return Ok(path.clone());
        }

        let dest = self.cache_dir.join(version);
        let existing = dest.join(BIN_NAME);
        let path = if tokio::fs::try_exists(&existing).await.unwrap_or(false) {
            tracing::debug!(version, path = %existing.display(), "toolchain already installed");
            existing
        } else {
            tracing::info!(version, "installing toolchain");
            self.installer.install(version, &dest).await?
        };

        self.installed.write().insert(version.to_string(), path.clone());
        Ok(path)
    }
}

/// Installer downloading official release archives.
pub struct ReleaseInstaller {
    base_url: String,
    client: reqwest::Client,
}

impl ReleaseInstaller {
    pub fn new(base_url: &str) -> Result<Self, ToolchainError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ToolchainError::Download {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn platform() -> Result<&'static str, ToolchainError> {
        match (std::env::consts::OS, std::env::consts::ARCH) {
            ("linux", "x86_64") => Ok("linux_amd64"),
            ("linux", "aarch64") => Ok("linux_arm64"),
            ("macos", "x86_64") => Ok("darwin_amd64"),
            ("macos", "aarch64") => Ok("darwin_arm64"),
            (os, arch) => Err(ToolchainError::UnsupportedPlatform { os, arch }),
        }
    }

    /// Download `url` into `path`, returning the hex sha256 of the bytes.
    async fn download(&self, url: &str, path: &Path) -> Result<String, ToolchainError> {
        let resp = self.client.get(url).send().await.map_err(|e| ToolchainError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !resp.status().is_success() {
            return Err(ToolchainError::Download {
                url: url.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ToolchainError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(hex(&hasher.finalize()))
    }

    async fn install_into(
        &self,
        tmp: &Path,
        version: &str,
        dest: &Path,
    ) -> Result<PathBuf, ToolchainError> {
        let platform = Self::platform()?;
        let file = format!("terraform_{version}_{platform}.zip");
        let archive = tmp.join(&file);

        let url = format!("{}/terraform/{version}/{file}", self.base_url);
        let digest = self.download(&url, &archive).await?;

        let sums_url =
            format!("{}/terraform/{version}/terraform_{version}_SHA256SUMS", self.base_url);
        let sums = self
            .client
            .get(&sums_url)
            .send()
            .await
            .map_err(|e| ToolchainError::Download { url: sums_url.clone(), reason: e.to_string() })?
            .error_for_status()
            .map_err(|e| ToolchainError::Download { url: sums_url.clone(), reason: e.to_string() })?
            .text()
            .await
            .map_err(|e| ToolchainError::Download { url: sums_url.clone(), reason: e.to_string() })?;
        let expected = expected_digest(&sums, &file)
            .ok_or_else(|| ToolchainError::ChecksumMismatch { file: file.clone() })?;
        if !digest.eq_ignore_ascii_case(&expected) {
            return Err(ToolchainError::ChecksumMismatch { file });
        }

        let mut cmd = tokio::process::Command::new("unzip");
        cmd.arg("-o").arg("-q").arg(&archive).arg("-d").arg(tmp);
        let output = run_with_timeout(cmd, EXTRACT_TIMEOUT, "unzip")
            .await
            .map_err(|e| ToolchainError::Extract(e.to_string()))?;
        if !output.status.success() {
            return Err(ToolchainError::Extract(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let binary = tmp.join(BIN_NAME);
        if !tokio::fs::try_exists(&binary).await.unwrap_or(false) {
            return Err(ToolchainError::Extract(format!("archive did not contain {BIN_NAME}")));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).await?;
        }
        tokio::fs::remove_file(&archive).await?;

        // atomic publish: only a fully verified install becomes visible
        let installed = dest.join(BIN_NAME);
        match tokio::fs::rename(tmp, dest).await {
            Ok(()) => Ok(installed),
            Err(_) if tokio::fs::try_exists(&installed).await.unwrap_or(false) => {
                // a concurrent process on the shared cache won the rename
                Ok(installed)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ToolchainInstaller for ReleaseInstaller {
    async fn install(&self, version: &str, dest: &Path) -> Result<PathBuf, ToolchainError> {
        let parent = dest.parent().unwrap_or(dest);
        tokio::fs::create_dir_all(parent).await?;
        let tmp = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&tmp).await?;

        let result = self.install_into(&tmp, version, dest).await;
        if result.is_err() {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
        }
        result
    }
}

/// Find the expected digest for `file` in a SHA256SUMS listing.
fn expected_digest(sums: &str, file: &str) -> Option<String> {
    sums.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        let name = parts.next()?;
        (name == file).then(|| digest.to_string())
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "toolchain_tests.rs"]
mod tests;
