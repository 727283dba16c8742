// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request side of a bridge connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::CourierError;
use courier_core::traits::transport::{OutboundContent, SendReceipt, TransportClient};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::protocol::{ClientFrame, Reply};

/// Waiters keyed by request id. The reader task completes them.
pub(crate) type Pending = Arc<DashMap<u64, oneshot::Sender<Reply>>>;

/// [`TransportClient`] that writes frames to the socket's writer task and
/// waits for the matching `reply`.
pub struct BridgeClient {
    outbound: mpsc::Sender<ClientFrame>,
    pending: Pending,
    next_req: AtomicU64,
    query_timeout: Duration,
}

impl BridgeClient {
    pub(crate) fn new(
        outbound: mpsc::Sender<ClientFrame>,
        pending: Pending,
        query_timeout: Duration,
    ) -> Self {
        Self {
            outbound,
            pending,
            next_req: AtomicU64::new(1),
            query_timeout,
        }
    }

    async fn request(&self, frame: impl FnOnce(u64) -> ClientFrame) -> Result<Reply, CourierError> {
        let req = self.next_req.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(req, tx);

        if self.outbound.send(frame(req)).await.is_err() {
            self.pending.remove(&req);
            return Err(CourierError::transport("bridge connection is closed"));
        }

        match tokio::time::timeout(self.query_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CourierError::transport(
                "bridge connection closed before replying",
            )),
            Err(_) => {
                self.pending.remove(&req);
                debug!(req, "bridge request timed out");
                Err(CourierError::Timeout {
                    duration: self.query_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl TransportClient for BridgeClient {
    async fn send(
        &self,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendReceipt, CourierError> {
        let to = to.to_string();
        let content = content.clone();
        let reply = self
            .request(|req| ClientFrame::Send { req, to, content })
            .await?;
        if reply.ok {
            Ok(SendReceipt {
                message_id: reply.message_id,
                raw: reply.raw,
            })
        } else {
            Err(CourierError::transport(
                reply.error.unwrap_or_else(|| "send rejected by bridge".into()),
            ))
        }
    }

    async fn ping(&self) -> Result<(), CourierError> {
        let reply = self.request(|req| ClientFrame::Ping { req }).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(CourierError::transport(
                reply.error.unwrap_or_else(|| "ping rejected by bridge".into()),
            ))
        }
    }

    async fn close(&self) {
        // The writer closes the socket after flushing this frame.
        let _ = self.outbound.send(ClientFrame::Close).await;
    }
}
