// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The supervisor: control operations over every session's connection.
//!
//! [`Supervisor`] is a cheap handle around shared state. The registry,
//! pairing cache and reconnect book are touched only in short synchronous
//! steps; storage and transport calls happen outside of them.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use courier_config::model::{CourierConfig, NotifyConfig};
use courier_core::traits::transport::ConnectTuning;
use courier_core::{
    CourierError, MessageLogEntry, MessageLogStore, SessionKey, SessionRecord, SessionStatus,
    SessionStore, Transport,
};
use tracing::{debug, info, warn};

use crate::audit::MessageAuditLog;
use crate::backoff::RetryPolicy;
use crate::credentials::CredentialStore;
use crate::gateway::MessageGateway;
use crate::lifecycle;
use crate::pairing::{PairingCode, PairingCodeCache};
use crate::projector::{self, SessionView, StatusProjector};
use crate::reconnect::ReconnectBook;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// Runtime settings, resolved once from [`CourierConfig`].
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub credentials_root: PathBuf,
    pub tuning: ConnectTuning,
    pub heartbeat_interval: Duration,
    pub ensure_client_max_wait: Duration,
    pub ensure_client_poll: Duration,
    pub restore_on_boot: bool,
    pub close_timeout: Duration,
    pub retry: RetryPolicy,
    pub notify: NotifyConfig,
    pub default_country_code: Option<String>,
    pub preview_chars: usize,
}

impl SupervisorSettings {
    pub fn from_config(config: &CourierConfig) -> Self {
        let transport = &config.transport;
        Self {
            credentials_root: PathBuf::from(&config.credentials.root_dir),
            tuning: ConnectTuning {
                connect_timeout: Duration::from_secs(transport.connect_timeout_secs),
                query_timeout: Duration::from_secs(transport.query_timeout_secs),
                keepalive_interval: Duration::from_secs(transport.keepalive_interval_secs),
                max_send_retries: transport.max_send_retries,
                sync_full_history: transport.sync_full_history,
                generate_link_previews: transport.generate_link_previews,
            },
            heartbeat_interval: config.supervisor.heartbeat_interval(),
            ensure_client_max_wait: config.supervisor.ensure_client_max_wait(),
            ensure_client_poll: config.supervisor.ensure_client_poll(),
            restore_on_boot: config.supervisor.restore_on_boot,
            close_timeout: config.supervisor.shutdown_close_timeout(),
            retry: RetryPolicy::from_config(&config.reconnect),
            notify: config.notify.clone(),
            default_country_code: config.messaging.default_country_code.clone(),
            preview_chars: config.messaging.preview_chars,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) settings: SupervisorSettings,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) projector: StatusProjector,
    pub(crate) audit: MessageAuditLog,
    pub(crate) credentials: CredentialStore,
    pub(crate) pairing: PairingCodeCache,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) reconnect: ReconnectBook,
    shutting_down: AtomicBool,
    started_at: Instant,
}

impl Inner {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// Owns every session connection in the process.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        settings: SupervisorSettings,
        transport: Arc<dyn Transport>,
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageLogStore>,
    ) -> Self {
        let credentials = CredentialStore::new(settings.credentials_root.clone());
        let audit = MessageAuditLog::new(messages, settings.preview_chars);
        Self {
            inner: Arc::new(Inner {
                projector: StatusProjector::new(Arc::clone(&sessions)),
                settings,
                transport,
                sessions,
                audit,
                credentials,
                pairing: PairingCodeCache::new(),
                registry: ConnectionRegistry::new(),
                reconnect: ReconnectBook::new(),
                shutting_down: AtomicBool::new(false),
                started_at: Instant::now(),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<Inner> {
        &self.inner
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    /// Send surface bound to this supervisor.
    pub fn gateway(&self) -> MessageGateway {
        MessageGateway::new(self.clone())
    }

    /// Restart sessions that were up when the process last stopped.
    ///
    /// Only rows persisted as `connected` or `disconnected` that still have
    /// credential material are restored. Returns how many starts were
    /// launched.
    pub async fn init(&self) -> Result<usize, CourierError> {
        if !self.inner.settings.restore_on_boot {
            info!("session restore disabled");
            return Ok(0);
        }

        let mut restored = 0;
        for record in self.inner.sessions.list_sessions(None, None).await? {
            if !matches!(
                record.status,
                SessionStatus::Connected | SessionStatus::Disconnected
            ) {
                continue;
            }
            let key = record.key();
            if !self.inner.credentials.has_material(&key).await {
                debug!(tenant = %key.tenant, session = %key.session, "no credentials on disk, not restoring");
                continue;
            }
            let supervisor = self.clone();
            tokio::spawn(async move {
                if let Err(e) = supervisor.start(&key).await {
                    warn!(tenant = %key.tenant, session = %key.session, error = %e, "failed to restore session");
                }
            });
            restored += 1;
        }
        info!(restored, "session restore launched");
        Ok(restored)
    }

    /// Create a session row in the `created` state.
    pub async fn create_session(
        &self,
        key: &SessionKey,
        name: Option<String>,
    ) -> Result<SessionRecord, CourierError> {
        if key.tenant.trim().is_empty() || key.session.trim().is_empty() {
            return Err(CourierError::InvalidRequest(
                "tenant and session id are required".into(),
            ));
        }
        self.inner.credentials.dir_for(key)?;

        let record = SessionRecord::new(key, name);
        self.inner.sessions.create_session(&record).await?;
        info!(tenant = %key.tenant, session = %key.session, "session created");
        Ok(record)
    }

    /// Operator start. Idempotent: a running session is returned as-is.
    ///
    /// A session in `error` is started from a clean slate: its credentials
    /// are wiped and its failure diagnostics reset, so it pairs again.
    pub async fn start(&self, key: &SessionKey) -> Result<ConnectionHandle, CourierError> {
        if self.inner.is_shutting_down() {
            return Err(CourierError::Internal("supervisor is shutting down".into()));
        }
        let record = self.load(key).await?;
        if let Some(handle) = self.inner.registry.get(key) {
            return Ok(handle);
        }

        self.inner.reconnect.clear(key);
        let update = if record.status == SessionStatus::Error {
            info!(tenant = %key.tenant, session = %key.session, "restarting failed session from scratch");
            self.inner.credentials.wipe(key).await?;
            projector::fresh_start()
        } else {
            projector::starting()
        };
        self.inner.projector.persist(key, &update).await?;

        lifecycle::start(&self.inner, key).await
    }

    /// Cancel any pending retry and close the live connection.
    ///
    /// Returns `false` when there was nothing to stop.
    pub async fn stop(&self, key: &SessionKey) -> Result<bool, CourierError> {
        let had_retry = self.inner.reconnect.clear(key);
        let (handle, removed) = self.inner.registry.remove(key);
        self.inner.pairing.clear(key);

        if let Some(handle) = &handle {
            lifecycle::close(handle, self.inner.settings.close_timeout).await;
        }
        if !removed && !had_retry {
            debug!(tenant = %key.tenant, session = %key.session, "stop requested but session is not running");
            return Ok(false);
        }

        self.inner.projector.persist(key, &projector::stopped()).await?;
        info!(tenant = %key.tenant, session = %key.session, had_retry, "session stopped");
        Ok(true)
    }

    /// Stop, wipe credentials and delete the row.
    pub async fn destroy(&self, key: &SessionKey) -> Result<(), CourierError> {
        self.stop(key).await?;
        self.inner.credentials.wipe(key).await?;
        if !self.inner.sessions.delete_session(key).await? {
            return Err(CourierError::NotFound { key: key.clone() });
        }
        info!(tenant = %key.tenant, session = %key.session, "session destroyed");
        Ok(())
    }

    /// An open connection for `key`, starting it if the session is meant to
    /// be up. Waits at most `max_wait` (or the configured default).
    pub async fn ensure_client(
        &self,
        key: &SessionKey,
        max_wait: Option<Duration>,
    ) -> Result<ConnectionHandle, CourierError> {
        if let Some(handle) = self.open_handle(key) {
            return Ok(handle);
        }

        let settings = &self.inner.settings;
        let max_wait = max_wait.unwrap_or(settings.ensure_client_max_wait);

        if !self.inner.registry.is_running(key) {
            let record = self.load(key).await?;
            if !record.status.is_resumable() {
                return Err(not_resumable(key, &record));
            }
            let inner = Arc::clone(&self.inner);
            let key = key.clone();
            tokio::spawn(async move {
                if let Err(e) = lifecycle::start(&inner, &key).await {
                    debug!(tenant = %key.tenant, session = %key.session, error = %e, "lazy start failed");
                }
            });
        }

        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            if let Some(handle) = self.open_handle(key) {
                return Ok(handle);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(CourierError::NotRunning {
                    key: key.clone(),
                    reason: format!("not ready after {} ms", max_wait.as_millis()),
                });
            }
            tokio::time::sleep(settings.ensure_client_poll.min(deadline - now)).await;
        }
    }

    pub fn is_running(&self, key: &SessionKey) -> bool {
        self.inner.registry.is_running(key)
    }

    /// Persisted row cross-checked against registry liveness.
    pub async fn status(&self, key: &SessionKey) -> Result<SessionView, CourierError> {
        let record = self.load(key).await?;
        Ok(self.view(record))
    }

    pub async fn list_sessions(&self, tenant: &str) -> Result<Vec<SessionView>, CourierError> {
        let records = self.inner.sessions.list_sessions(Some(tenant), None).await?;
        Ok(records.into_iter().map(|r| self.view(r)).collect())
    }

    pub fn pairing_code(&self, key: &SessionKey) -> Option<PairingCode> {
        self.inner.pairing.get(key)
    }

    /// Audit trail for a session, oldest first.
    pub async fn messages(
        &self,
        key: &SessionKey,
        limit: Option<i64>,
    ) -> Result<Vec<MessageLogEntry>, CourierError> {
        self.load(key).await?;
        self.inner.audit.list(key, limit).await
    }

    pub fn live_count(&self) -> usize {
        self.inner.registry.live_count()
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Tear down every connection and pending retry. Persisted status is
    /// left alone so the next boot can restore. Idempotent.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let retries = self.inner.reconnect.cancel_all();
        let handles = self.inner.registry.drain();
        for handle in &handles {
            handle.lifetime().cancel();
        }
        let timeout = self.inner.settings.close_timeout;
        futures::future::join_all(handles.iter().map(|h| lifecycle::close(h, timeout))).await;
        self.inner.pairing.clear_all();
        info!(
            connections = handles.len(),
            retries_cancelled = retries,
            "supervisor shut down"
        );
    }

    async fn load(&self, key: &SessionKey) -> Result<SessionRecord, CourierError> {
        self.inner
            .projector
            .load(key)
            .await?
            .ok_or_else(|| CourierError::NotFound { key: key.clone() })
    }

    fn open_handle(&self, key: &SessionKey) -> Option<ConnectionHandle> {
        self.inner.registry.get(key).filter(ConnectionHandle::is_open)
    }

    fn view(&self, record: SessionRecord) -> SessionView {
        let key = record.key();
        SessionView::new(
            record,
            self.inner.registry.is_running(&key),
            self.inner.pairing.get(&key).is_some(),
        )
    }
}

/// The error a send gets when the session is not meant to be up.
fn not_resumable(key: &SessionKey, record: &SessionRecord) -> CourierError {
    let diag = &record.diagnostics;
    match record.status {
        SessionStatus::Error if diag.max_attempts_reached == Some(true) => {
            CourierError::RetriesExhausted {
                key: key.clone(),
                attempts: diag.retry_count_at_failure.unwrap_or_default(),
            }
        }
        SessionStatus::Error if diag.retry_eligible == Some(false) => {
            CourierError::TerminalDisconnect {
                key: key.clone(),
                code: diag.last_disconnect_code,
                reason: diag.last_disconnect_reason.clone().unwrap_or_default(),
            }
        }
        status => CourierError::NotRunning {
            key: key.clone(),
            reason: format!("session is {status}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use courier_core::SessionDiagnostics;

    use super::*;

    fn record(status: SessionStatus, diagnostics: SessionDiagnostics) -> SessionRecord {
        let mut record = SessionRecord::new(&SessionKey::new("t", "s"), None);
        record.status = status;
        record.diagnostics = diagnostics;
        record
    }

    #[test]
    fn settings_follow_config() {
        let mut config = CourierConfig::default();
        config.transport.connect_timeout_secs = 12;
        config.supervisor.ensure_client_poll_ms = 50;
        config.messaging.default_country_code = Some("62".into());
        let settings = SupervisorSettings::from_config(&config);
        assert_eq!(settings.tuning.connect_timeout, Duration::from_secs(12));
        assert_eq!(settings.ensure_client_poll, Duration::from_millis(50));
        assert_eq!(settings.default_country_code.as_deref(), Some("62"));
        assert_eq!(settings.retry.fast.max_attempts, 3);
    }

    #[test]
    fn exhausted_session_reports_attempts() {
        let key = SessionKey::new("t", "s");
        let rec = record(
            SessionStatus::Error,
            SessionDiagnostics {
                retry_eligible: Some(false),
                max_attempts_reached: Some(true),
                retry_count_at_failure: Some(10),
                ..SessionDiagnostics::default()
            },
        );
        assert!(matches!(
            not_resumable(&key, &rec),
            CourierError::RetriesExhausted { attempts: 10, .. }
        ));
    }

    #[test]
    fn terminal_session_reports_cause() {
        let key = SessionKey::new("t", "s");
        let rec = record(
            SessionStatus::Error,
            SessionDiagnostics {
                retry_eligible: Some(false),
                max_attempts_reached: Some(false),
                last_disconnect_code: Some(401),
                last_disconnect_reason: Some("logged out".into()),
                ..SessionDiagnostics::default()
            },
        );
        match not_resumable(&key, &rec) {
            CourierError::TerminalDisconnect { code, reason, .. } => {
                assert_eq!(code, Some(401));
                assert_eq!(reason, "logged out");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_states_are_not_running() {
        let key = SessionKey::new("t", "s");
        for status in [SessionStatus::Stopped, SessionStatus::Disconnected, SessionStatus::Created] {
            let rec = record(status, SessionDiagnostics::default());
            assert!(matches!(
                not_resumable(&key, &rec),
                CourierError::NotRunning { .. }
            ));
        }
    }
}
