// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence boundary: session rows and the message audit log.
//!
//! The supervisor never sees SQL. It reads and patches session rows through
//! [`SessionStore`] and appends audit entries through [`MessageLogStore`].

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::Adapter;
use crate::types::{MessageLogEntry, SessionKey, SessionRecord, SessionStatus, SessionUpdate};

/// Durable storage for session rows.
#[async_trait]
pub trait SessionStore: Adapter {
    /// Insert a new row. Fails with `InvalidState` if the key already exists.
    async fn create_session(&self, record: &SessionRecord) -> Result<(), CourierError>;

    /// Fetch a row by key.
    async fn get_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, CourierError>;

    /// List rows, optionally narrowed to one tenant and/or one status.
    async fn list_sessions(
        &self,
        tenant: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionRecord>, CourierError>;

    /// Apply a partial update atomically. Returns `false` if the row is gone.
    async fn update_session(
        &self,
        key: &SessionKey,
        update: &SessionUpdate,
    ) -> Result<bool, CourierError>;

    /// Delete a row and everything that cascades from it.
    async fn delete_session(&self, key: &SessionKey) -> Result<bool, CourierError>;
}

/// Append-only storage for message audit entries.
#[async_trait]
pub trait MessageLogStore: Adapter {
    /// Append one entry.
    async fn append_message(&self, entry: &MessageLogEntry) -> Result<(), CourierError>;

    /// Most recent entries for a session in chronological order.
    async fn list_messages(
        &self,
        key: &SessionKey,
        limit: Option<i64>,
    ) -> Result<Vec<MessageLogEntry>, CourierError>;
}
