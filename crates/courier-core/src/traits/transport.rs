// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport boundary for the external session-protocol library.
//!
//! A [`Transport`] opens one connection per session and hands back a
//! [`TransportSession`]: a client for outbound requests plus an event
//! channel. Connection state changes arrive on the channel in the order the
//! transport emits them, so a supervisor can drive a per-session state
//! machine without nested callbacks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::CourierError;
use crate::traits::adapter::Adapter;
use crate::types::{MessageKind, SessionKey};

/// Connection tuning passed to the transport on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectTuning {
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub query_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub keepalive_interval: Duration,
    pub max_send_retries: u32,
    pub sync_full_history: bool,
    pub generate_link_previews: bool,
}

impl Default for ConnectTuning {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            query_timeout: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(30),
            max_send_retries: 2,
            sync_full_history: false,
            generate_link_previews: false,
        }
    }
}

/// Everything a transport needs to open a session.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub key: SessionKey,
    /// Directory holding the session's pairing material. Opaque to Courier.
    pub credentials_dir: PathBuf,
    pub tuning: ConnectTuning,
}

/// Identity the remote network resolved for a paired session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportIdentity {
    pub channel_identifier: String,
    pub device_label: Option<String>,
    pub transport_version: Option<String>,
}

/// Why a connection closed, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectCause {
    /// Protocol status code, if the transport supplied one.
    pub code: Option<u16>,
    pub reason: String,
}

impl DisconnectCause {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code}: {}", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// A message delivered to a session by the remote network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: Option<String>,
    pub from: String,
    pub group: Option<String>,
    pub kind: MessageKind,
    pub text: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Connection events, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A fresh pairing code is available for display.
    PairingCode(String),
    /// The connection is authenticated and usable.
    Opened(TransportIdentity),
    /// The connection is gone.
    Closed(DisconnectCause),
    /// A message arrived.
    MessageReceived(InboundMessage),
}

/// Where media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Url(String),
    Base64(String),
}

/// Outbound message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    Text {
        body: String,
    },
    Image {
        media: MediaSource,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
    },
    Document {
        media: MediaSource,
        file_name: String,
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl OutboundContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundContent::Text { .. } => MessageKind::Text,
            OutboundContent::Image { .. } => MessageKind::Image,
            OutboundContent::Document { .. } => MessageKind::Document,
        }
    }

    /// Human-readable text worth previewing in the audit log.
    pub fn preview_text(&self) -> Option<&str> {
        match self {
            OutboundContent::Text { body } => Some(body.as_str()),
            OutboundContent::Image { caption, .. } => caption.as_deref(),
            OutboundContent::Document {
                caption, file_name, ..
            } => caption.as_deref().or(Some(file_name.as_str())),
        }
    }
}

/// Transport acknowledgement of a send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Request surface of one open connection.
#[async_trait]
pub trait TransportClient: Send + Sync + 'static {
    /// Send content to a transport address.
    async fn send(
        &self,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendReceipt, CourierError>;

    /// A lightweight no-op round trip that keeps the session warm.
    async fn ping(&self) -> Result<(), CourierError>;

    /// Close the connection. A `Closed` event may still follow.
    async fn close(&self);
}

/// A freshly opened connection: its client plus its event stream.
pub struct TransportSession {
    pub client: Arc<dyn TransportClient>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Factory for per-session connections.
#[async_trait]
pub trait Transport: Adapter {
    /// Open a connection for `request.key`.
    ///
    /// Returning `Ok` means the socket exists and its event stream is live;
    /// authentication completes later and is reported as an event.
    async fn open(&self, request: OpenRequest) -> Result<TransportSession, CourierError>;
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
