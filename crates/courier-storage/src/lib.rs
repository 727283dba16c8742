// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Courier.
//!
//! WAL-mode SQLite with embedded migrations and a single writer thread
//! (`tokio-rusqlite`). [`SqliteStore`] implements both
//! [`courier_core::SessionStore`] and [`courier_core::MessageLogStore`].

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
