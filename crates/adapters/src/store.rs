// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact storage.
//!
//! Backends form a closed set selected by the configured storage type; the
//! engine only ever sees the [`ArtifactStore`] capability and never branches
//! on backend identity.

use async_trait::async_trait;
use quarry_core::StorageConfig;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from artifact storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage returned status {status} for {key}")]
    Unexpected { key: String, status: u16 },
}

/// Upload/download capability over job artifacts (state, output).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, key: &str, content: Vec<u8>) -> Result<(), StoreError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// Build the configured store.
pub fn new_store(config: &StorageConfig) -> Result<Arc<dyn ArtifactStore>, StoreError> {
    match config {
        StorageConfig::Local { root } => Ok(Arc::new(LocalStore::new(root.clone()))),
        StorageConfig::Remote { endpoint, token } => {
            Ok(Arc::new(RemoteStore::new(endpoint, token.clone())?))
        }
        StorageConfig::None => Ok(Arc::new(NoopStore)),
    }
}

/// Filesystem store rooted at a directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a key beneath the root, rejecting traversal outside it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        if key.is_empty()
            || rel.components().any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn upload(&self, key: &str, content: Vec<u8>) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        tracing::debug!(key, path = %path.display(), "artifact stored");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// HTTP object gateway: PUT/GET `<endpoint>/<key>` with optional bearer auth.
pub struct RemoteStore {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl RemoteStore {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { endpoint: endpoint.trim_end_matches('/').to_string(), token, client })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, key)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ArtifactStore for RemoteStore {
    async fn upload(&self, key: &str, content: Vec<u8>) -> Result<(), StoreError> {
        let resp = self.authed(self.client.put(self.url(key)).body(content)).send().await?;
        if !resp.status().is_success() {
            return Err(StoreError::Unexpected {
                key: key.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let resp = self.authed(self.client.get(self.url(key))).send().await?;
        if resp.status().as_u16() == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(StoreError::Unexpected {
                key: key.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Store used when no storage is configured: uploads are discarded.
pub struct NoopStore;

#[async_trait]
impl ArtifactStore for NoopStore {
    async fn upload(&self, key: &str, _content: Vec<u8>) -> Result<(), StoreError> {
        tracing::debug!(key, "no storage configured, artifact discarded");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::NotFound(key.to_string()))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ArtifactStore, StoreError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FakeStoreState {
        objects: HashMap<String, Vec<u8>>,
        fail_uploads: bool,
    }

    /// In-memory store recording uploads.
    #[derive(Clone)]
    pub struct FakeStore {
        inner: Arc<Mutex<FakeStoreState>>,
    }

    impl Default for FakeStore {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeStoreState {
                    objects: HashMap::new(),
                    fail_uploads: false,
                })),
            }
        }
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent upload fail.
        pub fn fail_uploads(&self) {
            self.inner.lock().fail_uploads = true;
        }

        /// Keys uploaded so far, sorted.
        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.inner.lock().objects.keys().cloned().collect();
            keys.sort();
            keys
        }

        pub fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.inner.lock().objects.get(key).cloned()
        }
    }

    #[async_trait]
    impl ArtifactStore for FakeStore {
        async fn upload(&self, key: &str, content: Vec<u8>) -> Result<(), StoreError> {
            let mut state = self.inner.lock();
            if state.fail_uploads {
                return Err(StoreError::Unexpected { key: key.to_string(), status: 500 });
            }
            state.objects.insert(key.to_string(), content);
            Ok(())
        }

        async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            self.inner
                .lock()
                .objects
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(key.to_string()))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeStore;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
