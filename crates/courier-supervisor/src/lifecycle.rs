// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening one connection and driving it until it closes.
//!
//! Each connection gets a task that reads its event channel, feeds events
//! through [`LinkState`], and performs the resulting step. A close is
//! classified by [`plan_close`]; retry-eligible closes arm a cancellable
//! timer in the [`ReconnectBook`](crate::reconnect::ReconnectBook) that
//! reopens the session later.

use std::sync::Arc;
use std::time::Duration;

use courier_core::traits::transport::{
    DisconnectCause, OpenRequest, OutboundContent, TransportEvent, TransportIdentity,
    TransportSession,
};
use courier_core::{CourierError, SessionKey, SessionStatus};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::fsm::{CloseDecision, LinkState, Step, plan_close};
use crate::gateway::normalize_recipient;
use crate::heartbeat;
use crate::projector;
use crate::registry::{ConnectionHandle, Reservation, ReservationGuard};
use crate::supervisor::Inner;

/// Return the live handle for `key`, opening a connection if none exists.
///
/// Concurrent callers for one key share a single open: the first reserves
/// the key, the rest wait for the reservation to resolve and look again.
pub(crate) async fn start(
    inner: &Arc<Inner>,
    key: &SessionKey,
) -> Result<ConnectionHandle, CourierError> {
    loop {
        if inner.is_shutting_down() {
            return Err(CourierError::Internal("supervisor is shutting down".into()));
        }
        match inner.registry.reserve(key) {
            Reservation::Live(handle) => return Ok(handle),
            Reservation::Pending(mut done) => {
                // Resolves when the opener commits or gives up.
                let _ = done.changed().await;
            }
            Reservation::Acquired(guard) => return open_reserved(inner, guard).await,
        }
    }
}

async fn open_reserved(
    inner: &Arc<Inner>,
    guard: ReservationGuard,
) -> Result<ConnectionHandle, CourierError> {
    let key = guard.key().clone();
    let generation = guard.generation();
    debug!(tenant = %key.tenant, session = %key.session, generation, "opening connection");

    let session = match open_transport(inner, &key).await {
        Ok(session) => session,
        Err(e) => {
            warn!(tenant = %key.tenant, session = %key.session, error = %e, "failed to open connection");
            let current = inner.registry.is_current(&key, generation);
            drop(guard);
            let retryable = matches!(
                e,
                CourierError::Transport { .. } | CourierError::Timeout { .. }
            );
            if current && retryable {
                connection_lost(inner, &key, DisconnectCause::new(None, format!("open failed: {e}")))
                    .await;
            }
            return Err(e);
        }
    };

    let handle = ConnectionHandle::new(key.clone(), generation, session.client);
    let handle = match guard.commit(handle) {
        Ok(handle) => handle,
        Err(orphan) => {
            debug!(tenant = %key.tenant, session = %key.session, "reservation revoked while opening");
            close(&orphan, inner.settings.close_timeout).await;
            return Err(CourierError::InvalidState {
                key,
                message: "stopped while connecting".into(),
            });
        }
    };

    if inner.is_shutting_down() {
        inner.registry.remove_if_current(&key, generation);
        close(&handle, inner.settings.close_timeout).await;
        return Err(CourierError::Internal("supervisor is shutting down".into()));
    }

    info!(tenant = %key.tenant, session = %key.session, generation, "connection registered");
    tokio::spawn(drive(Arc::clone(inner), handle.clone(), session.events));
    Ok(handle)
}

async fn open_transport(
    inner: &Inner,
    key: &SessionKey,
) -> Result<TransportSession, CourierError> {
    let credentials_dir = inner.credentials.ensure(key).await?;
    let request = OpenRequest {
        key: key.clone(),
        credentials_dir,
        tuning: inner.settings.tuning.clone(),
    };
    inner.transport.open(request).await
}

/// Cancel `handle`'s tasks and ask the transport to close, waiting at most
/// `timeout`.
pub(crate) async fn close(handle: &ConnectionHandle, timeout: Duration) {
    handle.lifetime().cancel();
    if tokio::time::timeout(timeout, handle.client().close()).await.is_err() {
        let key = handle.key();
        warn!(tenant = %key.tenant, session = %key.session, "transport close timed out");
    }
}

async fn drive(
    inner: Arc<Inner>,
    handle: ConnectionHandle,
    mut events: mpsc::Receiver<TransportEvent>,
) {
    let key = handle.key().clone();
    let generation = handle.generation();
    let mut state = LinkState::Connecting;

    loop {
        let event = tokio::select! {
            _ = handle.lifetime().cancelled() => break,
            event = events.recv() => event.unwrap_or_else(|| {
                TransportEvent::Closed(DisconnectCause::new(None, "event stream ended"))
            }),
        };
        if !inner.registry.is_current(&key, generation) {
            debug!(tenant = %key.tenant, session = %key.session, generation, "connection superseded, dropping events");
            break;
        }

        let (next, step) = state.apply(&event);
        state = next;
        match (step, event) {
            (Step::ShowPairingCode, TransportEvent::PairingCode(code)) => {
                info!(tenant = %key.tenant, session = %key.session, "pairing code available");
                inner.pairing.put(&key, code);
                inner.projector.record(&key, projector::pairing()).await;
            }
            (Step::MarkOpen, TransportEvent::Opened(identity)) => {
                on_opened(&inner, &handle, identity).await;
            }
            (Step::HandleClose, TransportEvent::Closed(cause)) => {
                on_closed(&inner, &handle, cause).await;
            }
            (Step::RecordInbound, TransportEvent::MessageReceived(message)) => {
                inner.audit.record_inbound(&key, &message).await;
            }
            _ => {}
        }
        if state.is_closed() {
            break;
        }
    }
    debug!(tenant = %key.tenant, session = %key.session, generation, "connection task finished");
}

async fn on_opened(inner: &Arc<Inner>, handle: &ConnectionHandle, identity: TransportIdentity) {
    let key = handle.key();
    handle.mark_open(identity.clone());
    inner.pairing.clear(key);
    inner.reconnect.reset(key);
    inner.projector.record(key, projector::opened(&identity)).await;
    info!(
        tenant = %key.tenant,
        session = %key.session,
        identifier = %identity.channel_identifier,
        "session connected"
    );

    heartbeat::spawn(handle.clone(), inner.settings.heartbeat_interval);
    send_connected_notice(inner, handle, &identity);
}

async fn on_closed(inner: &Arc<Inner>, handle: &ConnectionHandle, cause: DisconnectCause) {
    let key = handle.key();
    handle.lifetime().cancel();
    if inner
        .registry
        .remove_if_current(key, handle.generation())
        .is_none()
    {
        debug!(tenant = %key.tenant, session = %key.session, "close for a connection no longer registered");
        return;
    }
    inner.pairing.clear(key);
    info!(tenant = %key.tenant, session = %key.session, cause = %cause, "connection closed");
    connection_lost(inner, key, cause).await;
}

/// Classify a close and either arm a retry or park the session in `error`.
async fn connection_lost(inner: &Arc<Inner>, key: &SessionKey, cause: DisconnectCause) {
    if inner.is_shutting_down() {
        return;
    }
    let attempts = inner.reconnect.attempts(key);
    let decision = plan_close(&inner.settings.retry, &cause, attempts);

    match decision {
        CloseDecision::Retry { class, delay, .. } => {
            let attempt = inner.reconnect.record_attempt(key);
            schedule_retry(inner, key, delay);
            info!(
                tenant = %key.tenant,
                session = %key.session,
                attempt,
                delay_ms = delay.as_millis() as u64,
                class = ?class,
                "reconnect scheduled"
            );
            inner
                .projector
                .record(key, projector::closed(&decision, &cause, attempt))
                .await;
        }
        CloseDecision::Terminal => {
            inner.reconnect.clear(key);
            warn!(tenant = %key.tenant, session = %key.session, cause = %cause, "terminal disconnect, session needs a fresh start");
            inner
                .projector
                .record(key, projector::closed(&decision, &cause, attempts))
                .await;
        }
        CloseDecision::Exhausted { class, attempts } => {
            inner.reconnect.clear(key);
            warn!(tenant = %key.tenant, session = %key.session, attempts, class = ?class, cause = %cause, "reconnect attempts exhausted");
            inner
                .projector
                .record(key, projector::closed(&decision, &cause, attempts))
                .await;
        }
    }
}

fn schedule_retry(inner: &Arc<Inner>, key: &SessionKey, delay: Duration) {
    let (ticket, cancel) = inner.reconnect.arm(key);
    let inner = Arc::clone(inner);
    let key = key.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(tenant = %key.tenant, session = %key.session, ticket, "scheduled reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        if !inner.reconnect.claim(&key, ticket) {
            debug!(tenant = %key.tenant, session = %key.session, ticket, "scheduled reconnect superseded");
            return;
        }
        retry(&inner, &key).await;
    });
}

/// Reopen after a backoff delay, using the freshest persisted row.
///
/// The key is reserved before the row is reloaded, so a `stop` landing
/// while the reload is in flight revokes the reservation and wins.
async fn retry(inner: &Arc<Inner>, key: &SessionKey) {
    if inner.is_shutting_down() {
        return;
    }
    let guard = match inner.registry.reserve(key) {
        Reservation::Acquired(guard) => guard,
        Reservation::Live(_) | Reservation::Pending(_) => {
            debug!(tenant = %key.tenant, session = %key.session, "already connected or connecting, reconnect dropped");
            return;
        }
    };
    let generation = guard.generation();

    let record = match inner.projector.load(key).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            drop(guard);
            inner.reconnect.clear(key);
            debug!(tenant = %key.tenant, session = %key.session, "session deleted, reconnect dropped");
            return;
        }
        Err(e) => {
            warn!(tenant = %key.tenant, session = %key.session, error = %e, "could not load session for reconnect");
            let current = inner.registry.is_current(key, generation);
            drop(guard);
            if current {
                connection_lost(inner, key, DisconnectCause::new(None, format!("reload failed: {e}")))
                    .await;
            }
            return;
        }
    };
    if !inner.registry.is_current(key, generation) {
        debug!(tenant = %key.tenant, session = %key.session, "stopped while reconnecting, reconnect dropped");
        return;
    }
    if matches!(
        record.status,
        SessionStatus::Stopped | SessionStatus::Error | SessionStatus::Created
    ) {
        drop(guard);
        inner.reconnect.clear(key);
        debug!(tenant = %key.tenant, session = %key.session, status = %record.status, "session no longer wants a connection, reconnect dropped");
        return;
    }

    inner.projector.record(key, projector::retrying()).await;
    if !inner.registry.is_current(key, generation) {
        debug!(tenant = %key.tenant, session = %key.session, "stopped while reconnecting, reconnect dropped");
        return;
    }
    info!(
        tenant = %key.tenant,
        session = %key.session,
        attempt = inner.reconnect.attempts(key),
        "reconnecting"
    );
    if let Err(e) = open_reserved(inner, guard).await {
        debug!(tenant = %key.tenant, session = %key.session, error = %e, "reconnect attempt failed");
    }
}

/// Best-effort "connected" message. Failures are logged, never retried.
fn send_connected_notice(inner: &Arc<Inner>, handle: &ConnectionHandle, identity: &TransportIdentity) {
    let notify = &inner.settings.notify;
    if !notify.on_connect {
        return;
    }
    let key = handle.key();
    let target = notify
        .recipient
        .as_deref()
        .unwrap_or(identity.channel_identifier.as_str());
    let peer = match normalize_recipient(target, inner.settings.default_country_code.as_deref()) {
        Ok(peer) => peer,
        Err(e) => {
            warn!(tenant = %key.tenant, session = %key.session, error = %e, "connected notice has no usable recipient");
            return;
        }
    };
    let body = notify
        .text
        .replace("{session}", &key.session)
        .replace("{identifier}", &identity.channel_identifier);
    let content = OutboundContent::Text { body };

    let inner = Arc::clone(inner);
    let handle = handle.clone();
    tokio::spawn(async move {
        let key = handle.key();
        match handle.client().send(&peer, &content).await {
            Ok(receipt) => {
                inner
                    .audit
                    .record_outbound(key, &peer, &content, Ok(&receipt))
                    .await;
                debug!(tenant = %key.tenant, session = %key.session, to = %peer, "connected notice sent");
            }
            Err(e) => {
                warn!(tenant = %key.tenant, session = %key.session, error = %e, "connected notice failed");
                inner
                    .audit
                    .record_outbound(key, &peer, &content, Err(&e))
                    .await;
            }
        }
    });
}
