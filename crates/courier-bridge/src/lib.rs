// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter for an external session-protocol sidecar.
//!
//! The sidecar owns the messaging network protocol; Courier talks to it with
//! small JSON frames over one WebSocket per session.

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::BridgeClient;
pub use transport::BridgeTransport;
