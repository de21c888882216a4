// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quarry-daemon: the `quarryd` binary.
//!
//! Wires the configured adapters into a [`quarry_engine::JobRunner`] and
//! runs it in one of two lifecycles: a long-lived HTTP service accepting
//! jobs over POST (ONLINE), or a single-shot run of the job supplied via
//! encoded configuration (BATCH).

pub mod batch;
pub mod bootstrap;
pub mod server;

pub use bootstrap::{build_runner, BootstrapError};
