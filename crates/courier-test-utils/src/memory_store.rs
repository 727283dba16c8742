// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session and message-log store.
//!
//! Behaves like the SQLite store (insert-or-fail creates, key-wise
//! diagnostics merge, cascading deletes) without a blocking thread, so tests
//! under paused time stay deterministic.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    Adapter, AdapterType, CourierError, HealthStatus, MessageLogEntry, MessageLogStore,
    SessionKey, SessionRecord, SessionStatus, SessionStore, SessionUpdate,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionKey, SessionRecord>,
    messages: Mutex<Vec<MessageLogEntry>>,
    fail_appends: AtomicBool,
    get_delay_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make message-log appends fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Delay each `get_session` by `delay`, as a slow database would.
    pub fn set_get_delay(&self, delay: Duration) {
        self.get_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Snapshot of a row without going through the async trait.
    pub fn session(&self, key: &SessionKey) -> Option<SessionRecord> {
        self.sessions.get(key).map(|r| r.clone())
    }

    /// Patch a row directly, as an out-of-band writer would.
    pub fn update_session_now(&self, key: &SessionKey, update: SessionUpdate) -> bool {
        match self.sessions.get_mut(key) {
            Some(mut record) => {
                update.apply_to(&mut record);
                true
            }
            None => false,
        }
    }

    pub fn status(&self, key: &SessionKey) -> Option<SessionStatus> {
        self.sessions.get(key).map(|r| r.status)
    }

    /// Every logged message for `key`, oldest first.
    pub fn messages_for(&self, key: &SessionKey) -> Vec<MessageLogEntry> {
        self.messages
            .lock()
            .map(|all| {
                all.iter()
                    .filter(|m| m.tenant_id == key.tenant && m.session_id == key.session)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn poisoned() -> CourierError {
        CourierError::Internal("memory store lock poisoned".into())
    }
}

#[async_trait]
impl Adapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), CourierError> {
        match self.sessions.entry(record.key()) {
            Entry::Occupied(_) => Err(CourierError::InvalidState {
                key: record.key(),
                message: "session already exists".into(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, CourierError> {
        let delay = self.get_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(self.session(key))
    }

    async fn list_sessions(
        &self,
        tenant: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionRecord>, CourierError> {
        let mut rows: Vec<SessionRecord> = self
            .sessions
            .iter()
            .filter(|r| tenant.is_none_or(|t| r.tenant_id == t))
            .filter(|r| status.is_none_or(|s| r.status == s))
            .map(|r| r.clone())
            .collect();
        rows.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        Ok(rows)
    }

    async fn update_session(
        &self,
        key: &SessionKey,
        update: &SessionUpdate,
    ) -> Result<bool, CourierError> {
        Ok(self.update_session_now(key, update.clone()))
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<bool, CourierError> {
        if self.sessions.remove(key).is_none() {
            return Ok(false);
        }
        let mut messages = self.messages.lock().map_err(|_| Self::poisoned())?;
        messages.retain(|m| !(m.tenant_id == key.tenant && m.session_id == key.session));
        Ok(true)
    }
}

#[async_trait]
impl MessageLogStore for MemoryStore {
    async fn append_message(&self, entry: &MessageLogEntry) -> Result<(), CourierError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(CourierError::storage("message log unavailable"));
        }
        let key = SessionKey::new(&entry.tenant_id, &entry.session_id);
        if !self.sessions.contains_key(&key) {
            return Err(CourierError::storage(format!("no session row for {key}")));
        }
        self.messages
            .lock()
            .map_err(|_| Self::poisoned())?
            .push(entry.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        key: &SessionKey,
        limit: Option<i64>,
    ) -> Result<Vec<MessageLogEntry>, CourierError> {
        let all = self.messages_for(key);
        let keep = match limit {
            Some(n) if n >= 0 => (n as usize).min(all.len()),
            _ => all.len(),
        };
        Ok(all[all.len() - keep..].to_vec())
    }
}
