// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail of every send attempt and every inbound message.
//!
//! Appends never fail the caller: a storage error is logged and dropped.

use std::sync::Arc;

use courier_core::traits::transport::{InboundMessage, MediaSource, OutboundContent, SendReceipt};
use courier_core::types::now_rfc3339;
use courier_core::{
    CourierError, Direction, MessageLogEntry, MessageLogStore, SessionKey,
};
use serde_json::json;
use tracing::warn;

use crate::gateway::GROUP_SUFFIX;

pub struct MessageAuditLog {
    store: Arc<dyn MessageLogStore>,
    preview_chars: usize,
}

impl MessageAuditLog {
    pub fn new(store: Arc<dyn MessageLogStore>, preview_chars: usize) -> Self {
        Self {
            store,
            preview_chars,
        }
    }

    /// Log one send attempt and return the entry written.
    pub async fn record_outbound(
        &self,
        key: &SessionKey,
        peer: &str,
        content: &OutboundContent,
        outcome: Result<&SendReceipt, &CourierError>,
    ) -> MessageLogEntry {
        let entry = self.outbound_entry(key, peer, content, outcome);
        self.append(&entry).await;
        entry
    }

    pub async fn record_inbound(&self, key: &SessionKey, message: &InboundMessage) {
        let entry = MessageLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: key.tenant.clone(),
            session_id: key.session.clone(),
            group_id: message.group.clone(),
            direction: Direction::In,
            peer: message.from.clone(),
            kind: message.kind,
            preview: message
                .text
                .as_deref()
                .map(|t| truncate_preview(t, self.preview_chars)),
            payload: Some(message.raw.to_string()),
            error: None,
            created_at: now_rfc3339(),
        };
        self.append(&entry).await;
    }

    pub async fn list(
        &self,
        key: &SessionKey,
        limit: Option<i64>,
    ) -> Result<Vec<MessageLogEntry>, CourierError> {
        self.store.list_messages(key, limit).await
    }

    fn outbound_entry(
        &self,
        key: &SessionKey,
        peer: &str,
        content: &OutboundContent,
        outcome: Result<&SendReceipt, &CourierError>,
    ) -> MessageLogEntry {
        let (payload, error) = match outcome {
            Ok(receipt) => (
                json!({ "to": peer, "content": redacted(content), "receipt": receipt }),
                None,
            ),
            Err(e) => (
                json!({ "to": peer, "content": redacted(content) }),
                Some(e.to_string()),
            ),
        };
        MessageLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: key.tenant.clone(),
            session_id: key.session.clone(),
            group_id: peer.ends_with(GROUP_SUFFIX).then(|| peer.to_string()),
            direction: Direction::Out,
            peer: peer.to_string(),
            kind: content.kind(),
            preview: content
                .preview_text()
                .map(|t| truncate_preview(t, self.preview_chars)),
            payload: Some(payload.to_string()),
            error,
            created_at: now_rfc3339(),
        }
    }

    async fn append(&self, entry: &MessageLogEntry) {
        if let Err(e) = self.store.append_message(entry).await {
            warn!(
                tenant = %entry.tenant_id,
                session = %entry.session_id,
                direction = %entry.direction,
                error = %e,
                "failed to append message log entry"
            );
        }
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn truncate_preview(text: &str, max: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Content as JSON with inline media bytes replaced by their size.
fn redacted(content: &OutboundContent) -> serde_json::Value {
    let mut value = serde_json::to_value(content).unwrap_or_default();
    let media = match content {
        OutboundContent::Image { media, .. } | OutboundContent::Document { media, .. } => media,
        OutboundContent::Text { .. } => return value,
    };
    if let MediaSource::Base64(data) = media {
        value["media"] = json!({ "base64": format!("<{} bytes>", data.len()) });
    }
    value
}
