// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides a scriptable transport and in-memory stores so supervisor
//! behaviour can be exercised deterministically, under paused time, without
//! a sidecar or a database.
//!
//! # Components
//!
//! - [`MockTransport`] - Transport whose connections are driven by the test
//! - [`MemoryStore`] - Session and message-log store held in memory
//! - [`TestHarness`] - A wired [`Supervisor`](courier_supervisor::Supervisor)

pub mod harness;
pub mod memory_store;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder, identity};
pub use memory_store::MemoryStore;
pub use mock_transport::{MockClient, MockTransport};
