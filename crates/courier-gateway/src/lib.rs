// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP control surface for Courier.
//!
//! Tenant-scoped REST routes for session lifecycle and message sending, plus
//! an unauthenticated `/health` probe.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{AuthConfig, TENANT_HEADER, Tenant};
pub use error::ApiError;
pub use server::{AppState, router, serve};
