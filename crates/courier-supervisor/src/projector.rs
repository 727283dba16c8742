// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps persisted session rows in step with connection transitions, and
//! projects rows back out with live state folded in.

use std::sync::Arc;

use courier_core::traits::transport::{DisconnectCause, TransportIdentity};
use courier_core::types::now_rfc3339;
use courier_core::{
    CourierError, SessionDiagnostics, SessionKey, SessionRecord, SessionStatus, SessionStore,
    SessionUpdate,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::fsm::CloseDecision;

/// A session row as callers see it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub record: SessionRecord,
    /// Persisted status, degraded when the row claims a connection that is
    /// not actually live.
    pub actual_status: SessionStatus,
    pub is_running: bool,
    pub has_pairing_code: bool,
}

impl SessionView {
    pub fn new(record: SessionRecord, is_running: bool, has_pairing_code: bool) -> Self {
        Self {
            actual_status: effective_status(record.status, is_running),
            record,
            is_running,
            has_pairing_code,
        }
    }
}

/// `connected` without a live handle reads as `disconnected`.
pub fn effective_status(persisted: SessionStatus, is_running: bool) -> SessionStatus {
    match persisted {
        SessionStatus::Connected if !is_running => SessionStatus::Disconnected,
        other => other,
    }
}

pub struct StatusProjector {
    store: Arc<dyn SessionStore>,
}

impl StatusProjector {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Persist `update`. Returns `false` if the row no longer exists.
    pub async fn persist(
        &self,
        key: &SessionKey,
        update: &SessionUpdate,
    ) -> Result<bool, CourierError> {
        let found = self.store.update_session(key, update).await?;
        if found {
            debug!(tenant = %key.tenant, session = %key.session, status = ?update.status, "session row updated");
        }
        Ok(found)
    }

    /// Persist from an event handler: failures are logged and swallowed.
    pub async fn record(&self, key: &SessionKey, update: SessionUpdate) {
        match self.persist(key, &update).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(tenant = %key.tenant, session = %key.session, "session row gone, update dropped");
            }
            Err(e) => {
                warn!(tenant = %key.tenant, session = %key.session, error = %e, "failed to persist session status");
            }
        }
    }

    pub async fn load(&self, key: &SessionKey) -> Result<Option<SessionRecord>, CourierError> {
        self.store.get_session(key).await
    }
}

pub fn starting() -> SessionUpdate {
    SessionUpdate::status(SessionStatus::Starting)
}

/// An operator start from `error`: clear the give-up markers.
pub fn fresh_start() -> SessionUpdate {
    starting().with_diagnostics(SessionDiagnostics {
        max_attempts_reached: Some(false),
        retry_count_at_failure: Some(0),
        ..SessionDiagnostics::default()
    })
}

pub fn pairing() -> SessionUpdate {
    SessionUpdate {
        status: Some(SessionStatus::Starting),
        last_qr_at: Some(Some(now_rfc3339())),
        ..SessionUpdate::default()
    }
}

pub fn opened(identity: &TransportIdentity) -> SessionUpdate {
    SessionUpdate {
        status: Some(SessionStatus::Connected),
        channel_identifier: Some(Some(identity.channel_identifier.clone())),
        device_label: Some(identity.device_label.clone()),
        connected_at: Some(Some(now_rfc3339())),
        disconnected_at: Some(None),
        diagnostics: Some(SessionDiagnostics {
            transport_version: identity.transport_version.clone(),
            max_attempts_reached: Some(false),
            ..SessionDiagnostics::default()
        }),
        ..SessionUpdate::default()
    }
}

/// Row update for a close. `attempts` is the count before this close.
pub fn closed(decision: &CloseDecision, cause: &DisconnectCause, attempts: u32) -> SessionUpdate {
    let status = if decision.retry_eligible() {
        SessionStatus::Disconnected
    } else {
        SessionStatus::Error
    };
    SessionUpdate {
        status: Some(status),
        disconnected_at: Some(Some(now_rfc3339())),
        diagnostics: Some(SessionDiagnostics {
            last_disconnect_code: cause.code,
            last_disconnect_reason: Some(cause.reason.clone()),
            retry_eligible: Some(decision.retry_eligible()),
            retry_count_at_failure: Some(attempts),
            max_attempts_reached: Some(matches!(decision, CloseDecision::Exhausted { .. })),
            ..SessionDiagnostics::default()
        }),
        ..SessionUpdate::default()
    }
}

pub fn retrying() -> SessionUpdate {
    SessionUpdate::default().with_diagnostics(SessionDiagnostics {
        last_attempt_at: Some(now_rfc3339()),
        ..SessionDiagnostics::default()
    })
}

pub fn stopped() -> SessionUpdate {
    SessionUpdate {
        status: Some(SessionStatus::Stopped),
        disconnected_at: Some(Some(now_rfc3339())),
        ..SessionUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backoff::RetryClass;

    #[test]
    fn connected_without_live_handle_reads_disconnected() {
        assert_eq!(
            effective_status(SessionStatus::Connected, false),
            SessionStatus::Disconnected
        );
        assert_eq!(
            effective_status(SessionStatus::Connected, true),
            SessionStatus::Connected
        );
        assert_eq!(
            effective_status(SessionStatus::Stopped, false),
            SessionStatus::Stopped
        );
    }

    #[test]
    fn view_carries_both_statuses() {
        let mut record = SessionRecord::new(&SessionKey::new("t", "s"), None);
        record.status = SessionStatus::Connected;
        let view = SessionView::new(record, false, false);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "connected");
        assert_eq!(json["actual_status"], "disconnected");
        assert_eq!(json["is_running"], false);
        assert_eq!(json["tenant_id"], "t");
    }

    #[test]
    fn retryable_close_marks_disconnected() {
        let decision = CloseDecision::Retry {
            class: RetryClass::Standard,
            attempt: 2,
            delay: Duration::from_secs(8),
        };
        let update = closed(&decision, &DisconnectCause::new(Some(428), "closed"), 2);
        assert_eq!(update.status, Some(SessionStatus::Disconnected));
        let diag = update.diagnostics.unwrap();
        assert_eq!(diag.retry_eligible, Some(true));
        assert_eq!(diag.max_attempts_reached, Some(false));
        assert_eq!(diag.last_disconnect_code, Some(428));
    }

    #[test]
    fn exhausted_close_marks_error_with_flag() {
        let decision = CloseDecision::Exhausted {
            class: RetryClass::Standard,
            attempts: 10,
        };
        let update = closed(&decision, &DisconnectCause::new(None, "socket lost"), 10);
        assert_eq!(update.status, Some(SessionStatus::Error));
        let diag = update.diagnostics.unwrap();
        assert_eq!(diag.max_attempts_reached, Some(true));
        assert_eq!(diag.retry_count_at_failure, Some(10));
    }

    #[test]
    fn open_clears_disconnected_at() {
        let update = opened(&TransportIdentity {
            channel_identifier: "628123".into(),
            device_label: Some("Chrome".into()),
            transport_version: Some("2.3000".into()),
        });
        assert_eq!(update.disconnected_at, Some(None));
        assert_eq!(update.status, Some(SessionStatus::Connected));
    }
}
