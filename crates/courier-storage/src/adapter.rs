// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the session and message-log store traits.

use async_trait::async_trait;
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::{
    Adapter, AdapterType, CourierError, HealthStatus, MessageLogEntry, MessageLogStore,
    SessionKey, SessionRecord, SessionStatus, SessionStore, SessionUpdate,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed store. One instance serves both store traits.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database named by `config`, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, CourierError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store ready");
        Ok(Self { db })
    }

    /// Wrap an already opened database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Adapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let probe = self
            .db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err);
        Ok(match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), CourierError> {
        queries::sessions::create_session(&self.db, record).await
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, CourierError> {
        queries::sessions::get_session(&self.db, key).await
    }

    async fn list_sessions(
        &self,
        tenant: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionRecord>, CourierError> {
        queries::sessions::list_sessions(&self.db, tenant, status).await
    }

    async fn update_session(
        &self,
        key: &SessionKey,
        update: &SessionUpdate,
    ) -> Result<bool, CourierError> {
        queries::sessions::update_session(&self.db, key, update).await
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<bool, CourierError> {
        queries::sessions::delete_session(&self.db, key).await
    }
}

#[async_trait]
impl MessageLogStore for SqliteStore {
    async fn append_message(&self, entry: &MessageLogEntry) -> Result<(), CourierError> {
        queries::message_log::append_message(&self.db, entry).await
    }

    async fn list_messages(
        &self,
        key: &SessionKey,
        limit: Option<i64>,
    ) -> Result<Vec<MessageLogEntry>, CourierError> {
        queries::message_log::list_messages(&self.db, key, limit).await
    }
}
