// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log transport for live job output.
//!
//! The command executor streams combined stdout/stderr bytes into a
//! [`LogSink`] as they are produced, which is what makes following a running
//! job possible. One sink is opened per job run; the transport is chosen at
//! startup (local stdout, or a redis channel keyed by job and step ids).
//!
//! Losing a log line must never fail a job: publish errors are logged and
//! dropped.

use async_trait::async_trait;
use quarry_core::Job;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from log transport.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only byte sink for one job's output.
#[async_trait]
pub trait LogSink: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), LogError>;

    /// Flush and release the sink. Called once when the job finishes.
    async fn close(&mut self) -> Result<(), LogError>;
}

/// Opens one sink per job run.
#[async_trait]
pub trait LogSinkFactory: Send + Sync {
    async fn open(&self, job: &Job) -> Result<Box<dyn LogSink>, LogError>;
}

/// Sink writing to the process's stdout.
pub struct ConsoleSink {
    out: tokio::io::Stdout,
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), LogError> {
        self.out.write_all(chunk).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LogError> {
        self.out.flush().await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct ConsoleSinkFactory;

#[async_trait]
impl LogSinkFactory for ConsoleSinkFactory {
    async fn open(&self, _job: &Job) -> Result<Box<dyn LogSink>, LogError> {
        Ok(Box::new(ConsoleSink { out: tokio::io::stdout() }))
    }
}

/// Sink publishing to a redis channel keyed by job and step ids, so a log
/// follower can subscribe to exactly one job's stream.
pub struct RedisSink {
    conn: redis::aio::ConnectionManager,
    channel: String,
}

#[async_trait]
impl LogSink for RedisSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), LogError> {
        let result: Result<(), redis::RedisError> = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(chunk)
            .query_async(&mut self.conn)
            .await;
        if let Err(e) = result {
            tracing::warn!(channel = %self.channel, error = %e, "log publish failed");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LogError> {
        Ok(())
    }
}

/// Factory connecting to redis once per job.
pub struct RedisSinkFactory {
    client: redis::Client,
}

impl RedisSinkFactory {
    pub fn new(url: &str) -> Result<Self, LogError> {
        Ok(Self { client: redis::Client::open(url)? })
    }
}

#[async_trait]
impl LogSinkFactory for RedisSinkFactory {
    async fn open(&self, job: &Job) -> Result<Box<dyn LogSink>, LogError> {
        let conn = redis::aio::ConnectionManager::new(self.client.clone()).await?;
        let channel = format!("logs:{}:{}", job.job_id, job.step_id);
        Ok(Box::new(RedisSink { conn, channel }))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{LogError, LogSink, LogSinkFactory};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use quarry_core::Job;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Sink capturing bytes into a shared buffer.
    pub struct MemorySink {
        buffer: Arc<Mutex<Vec<u8>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl LogSink for MemorySink {
        async fn write(&mut self, chunk: &[u8]) -> Result<(), LogError> {
            self.buffer.lock().extend_from_slice(chunk);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), LogError> {
            *self.closed.lock() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryFactoryState {
        buffers: HashMap<String, Arc<Mutex<Vec<u8>>>>,
        closed: HashMap<String, Arc<Mutex<bool>>>,
    }

    /// Factory keeping every job's captured output for assertions.
    #[derive(Clone, Default)]
    pub struct MemorySinkFactory {
        inner: Arc<Mutex<MemoryFactoryState>>,
    }

    impl MemorySinkFactory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Captured output for a job, if a sink was opened for it.
        pub fn output_for(&self, job_id: &str) -> Option<String> {
            let state = self.inner.lock();
            state.buffers.get(job_id).map(|b| String::from_utf8_lossy(&b.lock()).into_owned())
        }

        /// Whether the job's sink was closed.
        pub fn closed_for(&self, job_id: &str) -> bool {
            let state = self.inner.lock();
            state.closed.get(job_id).map(|c| *c.lock()).unwrap_or(false)
        }
    }

    #[async_trait]
    impl LogSinkFactory for MemorySinkFactory {
        async fn open(&self, job: &Job) -> Result<Box<dyn LogSink>, LogError> {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(Mutex::new(false));
            let mut state = self.inner.lock();
            state.buffers.insert(job.job_id.to_string(), Arc::clone(&buffer));
            state.closed.insert(job.job_id.to_string(), Arc::clone(&closed));
            Ok(Box::new(MemorySink { buffer, closed }))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{MemorySink, MemorySinkFactory};

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
