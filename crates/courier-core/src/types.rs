// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the supervisor, storage, and HTTP layers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifies one logical session: a tenant scope plus the session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub tenant: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(tenant: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            session: session.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant, self.session)
    }
}

/// Persisted lifecycle status of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Starting,
    Connected,
    Disconnected,
    Stopped,
    Error,
}

impl SessionStatus {
    /// Whether a lazy send may bring this session back up on demand.
    pub fn is_resumable(self) -> bool {
        matches!(self, SessionStatus::Connected | SessionStatus::Starting)
    }
}

/// Free-form diagnostic metadata attached to a session row.
///
/// Known keys are typed; anything else a transport reports lands in `extra`.
/// Patches are merged key-wise: a `None` field in a patch leaves the stored
/// value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_eligible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count_at_failure: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts_reached: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionDiagnostics {
    /// Merge `patch` into `self`, overwriting only the fields the patch sets.
    pub fn merge(&mut self, patch: &SessionDiagnostics) {
        if patch.transport_version.is_some() {
            self.transport_version.clone_from(&patch.transport_version);
        }
        if patch.last_disconnect_code.is_some() {
            self.last_disconnect_code = patch.last_disconnect_code;
        }
        if patch.last_disconnect_reason.is_some() {
            self.last_disconnect_reason
                .clone_from(&patch.last_disconnect_reason);
        }
        if patch.retry_eligible.is_some() {
            self.retry_eligible = patch.retry_eligible;
        }
        if patch.retry_count_at_failure.is_some() {
            self.retry_count_at_failure = patch.retry_count_at_failure;
        }
        if patch.max_attempts_reached.is_some() {
            self.max_attempts_reached = patch.max_attempts_reached;
        }
        if patch.last_attempt_at.is_some() {
            self.last_attempt_at.clone_from(&patch.last_attempt_at);
        }
        for (k, v) in &patch.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }
}

/// A durable session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub tenant_id: String,
    pub id: String,
    pub name: Option<String>,
    pub status: SessionStatus,
    pub channel_identifier: Option<String>,
    pub device_label: Option<String>,
    pub last_qr_at: Option<String>,
    pub connected_at: Option<String>,
    pub disconnected_at: Option<String>,
    pub diagnostics: SessionDiagnostics,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionRecord {
    /// A fresh row in the `created` state.
    pub fn new(key: &SessionKey, name: Option<String>) -> Self {
        let now = now_rfc3339();
        Self {
            tenant_id: key.tenant.clone(),
            id: key.session.clone(),
            name,
            status: SessionStatus::Created,
            channel_identifier: None,
            device_label: None,
            last_qr_at: None,
            connected_at: None,
            disconnected_at: None,
            diagnostics: SessionDiagnostics::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.tenant_id, &self.id)
    }
}

/// A partial update to a session row.
///
/// Outer `None` means "leave unchanged"; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub channel_identifier: Option<Option<String>>,
    pub device_label: Option<Option<String>>,
    pub last_qr_at: Option<Option<String>>,
    pub connected_at: Option<Option<String>>,
    pub disconnected_at: Option<Option<String>>,
    pub diagnostics: Option<SessionDiagnostics>,
}

impl SessionUpdate {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: SessionDiagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Apply this patch in place and bump `updated_at`.
    pub fn apply_to(&self, record: &mut SessionRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(v) = &self.channel_identifier {
            record.channel_identifier.clone_from(v);
        }
        if let Some(v) = &self.device_label {
            record.device_label.clone_from(v);
        }
        if let Some(v) = &self.last_qr_at {
            record.last_qr_at.clone_from(v);
        }
        if let Some(v) = &self.connected_at {
            record.connected_at.clone_from(v);
        }
        if let Some(v) = &self.disconnected_at {
            record.disconnected_at.clone_from(v);
        }
        if let Some(patch) = &self.diagnostics {
            record.diagnostics.merge(patch);
        }
        record.updated_at = now_rfc3339();
    }
}

/// Direction of a logged message relative to this process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// Kind of message content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Document,
    Audio,
    Video,
    Sticker,
    Other,
}

/// One append-only audit entry for a sent or received message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    pub group_id: Option<String>,
    pub direction: Direction,
    pub peer: String,
    pub kind: MessageKind,
    pub preview: Option<String>,
    pub payload: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a boundary trait.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Storage,
}

/// Current UTC time in the RFC 3339 form used for every persisted timestamp.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
