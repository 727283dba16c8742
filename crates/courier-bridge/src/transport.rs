// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Transport`] over one WebSocket per session.
//!
//! `open` connects to the sidecar, sends the `open` frame, then splits the
//! socket between a writer task (fed by [`BridgeClient`]) and a reader task
//! that turns sidecar frames into [`TransportEvent`]s. Losing the socket
//! without a `close` event from the sidecar reports a close with no code.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::traits::transport::{
    DisconnectCause, OpenRequest, Transport, TransportEvent, TransportSession,
};
use courier_core::{Adapter, AdapterType, CourierError, HealthStatus, SessionKey};
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::client::{BridgeClient, Pending};
use crate::protocol::{ClientFrame, Inbound, ServerFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 64;
const OUTBOUND_BUFFER: usize = 32;

/// Transport speaking the sidecar's JSON protocol.
pub struct BridgeTransport {
    url: String,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self, timeout: Duration) -> Result<Socket, CourierError> {
        let connecting = connect_async(self.url.as_str());
        let (socket, _response) = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| CourierError::Timeout { duration: timeout })?
            .map_err(|e| CourierError::Transport {
                message: format!("bridge connect to {} failed", self.url),
                source: Some(Box::new(e)),
            })?;
        Ok(socket)
    }
}

#[async_trait]
impl Adapter for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
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
impl Transport for BridgeTransport {
    async fn open(&self, request: OpenRequest) -> Result<TransportSession, CourierError> {
        let OpenRequest {
            key,
            credentials_dir,
            tuning,
        } = request;
        let socket = self.connect(tuning.connect_timeout).await?;
        let (mut sink, stream) = socket.split();

        let hello = ClientFrame::Open {
            tenant: key.tenant.clone(),
            session: key.session.clone(),
            credentials_dir,
            tuning: tuning.clone(),
        };
        let text = serde_json::to_string(&hello)
            .map_err(|e| CourierError::Internal(format!("encode open frame: {e}")))?;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| CourierError::Transport {
                message: "bridge rejected the open frame".into(),
                source: Some(Box::new(e)),
            })?;
        info!(tenant = %key.tenant, session = %key.session, url = %self.url, "bridge socket open");

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let pending: Pending = Arc::new(DashMap::new());

        tokio::spawn(write_loop(sink, outbound_rx, key.clone()));
        tokio::spawn(read_loop(stream, events_tx, Arc::clone(&pending), key));

        Ok(TransportSession {
            client: Arc::new(BridgeClient::new(
                outbound_tx,
                pending,
                tuning.query_timeout,
            )),
            events: events_rx,
        })
    }
}

async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut frames: mpsc::Receiver<ClientFrame>,
    key: SessionKey,
) {
    while let Some(frame) = frames.recv().await {
        let closing = frame == ClientFrame::Close;
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(session = %key, error = %e, "dropping unencodable bridge frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            debug!(session = %key, error = %e, "bridge write failed");
            break;
        }
        if closing {
            let _ = sink.close().await;
            break;
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<Socket>,
    events: mpsc::Sender<TransportEvent>,
    pending: Pending,
    key: SessionKey,
) {
    let mut reported_close = false;
    let reason = loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => break format!("bridge socket error: {e}"),
            None => break "bridge socket ended".to_string(),
        };
        match message {
            Message::Text(text) => {
                let frame = match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(session = %key, error = %e, "ignoring unrecognised bridge frame");
                        continue;
                    }
                };
                match frame.into_inbound() {
                    Inbound::Reply(req, reply) => {
                        if let Some((_, waiter)) = pending.remove(&req) {
                            let _ = waiter.send(reply);
                        }
                    }
                    Inbound::Event(event) => {
                        reported_close |= matches!(event, TransportEvent::Closed(_));
                        if events.send(event).await.is_err() {
                            // Nobody is driving this connection any more.
                            pending.clear();
                            return;
                        }
                    }
                }
            }
            Message::Close(frame) => {
                break frame
                    .map(|f| f.reason.as_str().to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "bridge closed the socket".to_string());
            }
            // Pings are answered by tungstenite on the next read.
            _ => {}
        }
    };

    pending.clear();
    if !reported_close {
        debug!(session = %key, %reason, "bridge socket lost");
        let _ = events
            .send(TransportEvent::Closed(DisconnectCause::new(None, reason)))
            .await;
    }
}
