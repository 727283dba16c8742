// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` hands out connections whose event streams the test drives
//! with [`MockTransport::emit`], and whose clients record every send, ping
//! and close for assertions.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::traits::transport::{
    DisconnectCause, OpenRequest, OutboundContent, SendReceipt, TransportEvent,
    TransportIdentity, TransportSession,
};
use courier_core::{
    Adapter, AdapterType, CourierError, HealthStatus, SessionKey, Transport, TransportClient,
};
use dashmap::DashMap;
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 64;

/// Client side of one mock connection.
pub struct MockClient {
    sent: Mutex<Vec<(String, OutboundContent)>>,
    pings: AtomicUsize,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    next_id: AtomicU64,
}

impl MockClient {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            pings: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Every successful send as `(to, content)`.
    pub fn sent(&self) -> Vec<(String, OutboundContent)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Make every following send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportClient for MockClient {
    async fn send(&self, to: &str, content: &OutboundContent) -> Result<SendReceipt, CourierError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(CourierError::transport("mock send rejected"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), content.clone()));
        }
        Ok(SendReceipt {
            message_id: Some(format!("mock-{id}")),
            raw: serde_json::json!({ "status": "sent", "to": to }),
        })
    }

    async fn ping(&self) -> Result<(), CourierError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MockConnection {
    events: mpsc::Sender<TransportEvent>,
    client: Arc<MockClient>,
    request: OpenRequest,
}

/// A transport whose connections are scripted by the test.
pub struct MockTransport {
    connections: DashMap<SessionKey, MockConnection>,
    opens: DashMap<SessionKey, usize>,
    fail_opens: AtomicBool,
    open_delay_ms: AtomicU64,
    auto_open: Mutex<Option<TransportIdentity>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            opens: DashMap::new(),
            fail_opens: AtomicBool::new(false),
            open_delay_ms: AtomicU64::new(0),
            auto_open: Mutex::new(None),
        }
    }

    /// Report every new connection as opened with `identity` right away.
    pub fn auto_open(&self, identity: Option<TransportIdentity>) {
        if let Ok(mut slot) = self.auto_open.lock() {
            *slot = identity;
        }
    }

    /// Make `open` fail with a transport error.
    pub fn fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Delay each `open` by `delay`.
    pub fn set_open_delay(&self, delay: Duration) {
        self.open_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Opens attempted for `key`, successful or not.
    pub fn open_count(&self, key: &SessionKey) -> usize {
        self.opens.get(key).map_or(0, |n| *n)
    }

    pub fn total_opens(&self) -> usize {
        self.opens.iter().map(|n| *n.value()).sum()
    }

    /// Client of the most recent connection for `key`.
    pub fn client(&self, key: &SessionKey) -> Option<Arc<MockClient>> {
        self.connections.get(key).map(|c| Arc::clone(&c.client))
    }

    /// The request of the most recent open for `key`.
    pub fn last_request(&self, key: &SessionKey) -> Option<OpenRequest> {
        self.connections.get(key).map(|c| c.request.clone())
    }

    /// Push an event onto the most recent connection for `key`.
    pub async fn emit(&self, key: &SessionKey, event: TransportEvent) -> bool {
        let Some(events) = self.connections.get(key).map(|c| c.events.clone()) else {
            tracing::debug!(%key, "no mock connection to emit on");
            return false;
        };
        if events.send(event).await.is_err() {
            tracing::debug!(%key, "mock connection receiver is gone");
            return false;
        }
        true
    }

    pub async fn pairing_code(&self, key: &SessionKey, code: &str) -> bool {
        self.emit(key, TransportEvent::PairingCode(code.to_string()))
            .await
    }

    pub async fn authenticate(&self, key: &SessionKey, identity: TransportIdentity) -> bool {
        self.emit(key, TransportEvent::Opened(identity)).await
    }

    pub async fn disconnect(&self, key: &SessionKey, code: Option<u16>, reason: &str) -> bool {
        self.emit(key, TransportEvent::Closed(DisconnectCause::new(code, reason)))
            .await
    }

    /// Drop the event sender, as if the socket vanished.
    pub fn sever(&self, key: &SessionKey) -> bool {
        self.connections.remove(key).is_some()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, request: OpenRequest) -> Result<TransportSession, CourierError> {
        *self.opens.entry(request.key.clone()).or_insert(0) += 1;

        let delay = self.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(CourierError::transport("mock open refused"));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Arc::new(MockClient::new());
        let auto_open = self.auto_open.lock().ok().and_then(|slot| slot.clone());
        if let Some(identity) = auto_open {
            let _ = tx.try_send(TransportEvent::Opened(identity));
        }
        self.connections.insert(
            request.key.clone(),
            MockConnection {
                events: tx,
                client: Arc::clone(&client),
                request,
            },
        );

        Ok(TransportSession {
            client,
            events: rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::traits::transport::ConnectTuning;

    fn request(key: &SessionKey) -> OpenRequest {
        OpenRequest {
            key: key.clone(),
            credentials_dir: std::env::temp_dir(),
            tuning: ConnectTuning::default(),
        }
    }

    #[tokio::test]
    async fn emitted_events_reach_the_session() {
        let transport = MockTransport::new();
        let key = SessionKey::new("t", "s");
        let mut session = transport.open(request(&key)).await.unwrap();

        assert!(transport.pairing_code(&key, "2@abc").await);
        assert_eq!(
            session.events.recv().await,
            Some(TransportEvent::PairingCode("2@abc".into()))
        );
        assert_eq!(transport.open_count(&key), 1);
    }

    #[tokio::test]
    async fn sever_ends_the_stream() {
        let transport = MockTransport::new();
        let key = SessionKey::new("t", "s");
        let mut session = transport.open(request(&key)).await.unwrap();
        assert!(transport.sever(&key));
        assert_eq!(session.events.recv().await, None);
    }

    #[tokio::test]
    async fn failing_client_records_nothing() {
        let client = MockClient::new();
        client.fail_sends(true);
        let content = OutboundContent::Text { body: "hi".into() };
        assert!(client.send("x@s.whatsapp.net", &content).await.is_err());
        assert_eq!(client.sent_count(), 0);
    }
}
