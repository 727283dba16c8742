// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier session supervisor.
//!
//! This crate provides the error taxonomy, the session and message-log data
//! model, and the boundary traits for the collaborators Courier does not own:
//! the messaging transport and the persistence layer.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AdapterType, Direction, HealthStatus, MessageKind, MessageLogEntry, SessionDiagnostics,
    SessionKey, SessionRecord, SessionStatus, SessionUpdate,
};

pub use traits::{Adapter, MessageLogStore, SessionStore, Transport, TransportClient};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn session_status_round_trips_through_strings() {
        let variants = [
            SessionStatus::Created,
            SessionStatus::Starting,
            SessionStatus::Connected,
            SessionStatus::Disconnected,
            SessionStatus::Stopped,
            SessionStatus::Error,
        ];
        for variant in variants {
            let s = variant.to_string();
            assert_eq!(SessionStatus::from_str(&s).unwrap(), variant);
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
        assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn only_connected_and_starting_are_resumable() {
        assert!(SessionStatus::Connected.is_resumable());
        assert!(SessionStatus::Starting.is_resumable());
        assert!(!SessionStatus::Created.is_resumable());
        assert!(!SessionStatus::Stopped.is_resumable());
        assert!(!SessionStatus::Error.is_resumable());
        assert!(!SessionStatus::Disconnected.is_resumable());
    }

    #[test]
    fn diagnostics_merge_keeps_unset_fields() {
        let mut stored = SessionDiagnostics {
            transport_version: Some("2.3000".into()),
            last_disconnect_code: Some(428),
            ..SessionDiagnostics::default()
        };
        let patch = SessionDiagnostics {
            last_disconnect_code: Some(515),
            max_attempts_reached: Some(true),
            ..SessionDiagnostics::default()
        };
        stored.merge(&patch);
        assert_eq!(stored.transport_version.as_deref(), Some("2.3000"));
        assert_eq!(stored.last_disconnect_code, Some(515));
        assert_eq!(stored.max_attempts_reached, Some(true));
    }

    #[test]
    fn diagnostics_keep_unknown_keys() {
        let json = r#"{"last_disconnect_code":401,"platform":"android"}"#;
        let diag: SessionDiagnostics = serde_json::from_str(json).unwrap();
        assert_eq!(diag.last_disconnect_code, Some(401));
        assert_eq!(diag.extra["platform"], "android");
        let back = serde_json::to_value(&diag).unwrap();
        assert_eq!(back["platform"], "android");
    }

    #[test]
    fn update_clears_nullable_columns() {
        let key = SessionKey::new("acme", "sales");
        let mut record = SessionRecord::new(&key, None);
        record.disconnected_at = Some("2026-01-01T00:00:00.000Z".into());

        let update = SessionUpdate {
            status: Some(SessionStatus::Connected),
            disconnected_at: Some(None),
            channel_identifier: Some(Some("628123".into())),
            ..SessionUpdate::default()
        };
        update.apply_to(&mut record);

        assert_eq!(record.status, SessionStatus::Connected);
        assert!(record.disconnected_at.is_none());
        assert_eq!(record.channel_identifier.as_deref(), Some("628123"));
        assert_eq!(record.key(), key);
    }

    #[test]
    fn session_key_display() {
        assert_eq!(SessionKey::new("t1", "s1").to_string(), "t1/s1");
    }

    #[test]
    fn error_messages_name_the_session() {
        let key = SessionKey::new("t", "s");
        let err = CourierError::NotRunning {
            key: key.clone(),
            reason: "timed out".into(),
        };
        assert_eq!(err.to_string(), "session t/s is not running: timed out");
        let err = CourierError::RetriesExhausted { key, attempts: 10 };
        assert!(err.to_string().contains("10"));
    }
}
