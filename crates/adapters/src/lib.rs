// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the executor's external collaborators: coordinator status
//! reporting, artifact storage, log transport, token minting, and a shared
//! subprocess helper.

pub mod logs;
pub mod status;
pub mod store;
pub mod subprocess;
pub mod token;

pub use logs::{ConsoleSinkFactory, LogError, LogSink, LogSinkFactory, RedisSinkFactory};
pub use status::{HttpStatusAdapter, LogStatusAdapter, StatusAdapter, StatusError};
pub use store::{new_store, ArtifactStore, LocalStore, NoopStore, RemoteStore, StoreError};
pub use subprocess::{run_with_timeout, SubprocessError};
pub use token::{SecretTokenMinter, TokenError, TokenMinter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use logs::{MemorySink, MemorySinkFactory};
#[cfg(any(test, feature = "test-support"))]
pub use status::{FakeStatusAdapter, StatusCall};
#[cfg(any(test, feature = "test-support"))]
pub use store::FakeStore;
#[cfg(any(test, feature = "test-support"))]
pub use token::FakeTokenMinter;
