// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound sends: normalize the recipient, bring the connection up if
//! needed, send, and log the attempt whatever the outcome.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use courier_core::traits::transport::{MediaSource, OutboundContent};
use courier_core::{CourierError, MessageKind, SessionKey};
use serde::Serialize;
use tracing::{debug, warn};

use crate::supervisor::Supervisor;

/// Address suffix for individual users.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";
/// Address suffix for groups.
pub const GROUP_SUFFIX: &str = "@g.us";

const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// Turn caller input into a transport address.
///
/// Anything already carrying a domain (`@`) passes through untouched. Phone
/// numbers lose their formatting; an international `00` prefix is dropped
/// and a national leading `0` is replaced by `default_country_code` when one
/// is configured.
pub fn normalize_recipient(
    input: &str,
    default_country_code: Option<&str>,
) -> Result<String, CourierError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CourierError::InvalidRequest("recipient is empty".into()));
    }
    if input.contains('@') {
        return Ok(input.to_string());
    }
    if let Some(bad) = input
        .chars()
        .find(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.')))
    {
        return Err(CourierError::InvalidRequest(format!(
            "recipient `{input}` contains unexpected character `{bad}`"
        )));
    }

    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    let international = if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let (Some(rest), Some(cc)) = (digits.strip_prefix('0'), default_country_code) {
        format!("{cc}{rest}")
    } else {
        digits
    };

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&international.len()) {
        return Err(CourierError::InvalidRequest(format!(
            "recipient `{input}` is not a valid phone number"
        )));
    }
    Ok(format!("{international}{USER_SUFFIX}"))
}

/// What a caller gets back from a successful send.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub log_id: String,
    pub to: String,
    pub kind: MessageKind,
    pub message_id: Option<String>,
    pub created_at: String,
}

/// Public send surface over the supervisor.
#[derive(Clone)]
pub struct MessageGateway {
    supervisor: Supervisor,
}

impl MessageGateway {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    pub async fn send_text(
        &self,
        key: &SessionKey,
        to: &str,
        body: impl Into<String>,
    ) -> Result<SendOutcome, CourierError> {
        self.send(key, to, OutboundContent::Text { body: body.into() }, None)
            .await
    }

    pub async fn send_image(
        &self,
        key: &SessionKey,
        to: &str,
        media: MediaSource,
        caption: Option<String>,
        mime_type: Option<String>,
    ) -> Result<SendOutcome, CourierError> {
        let content = OutboundContent::Image {
            media,
            caption,
            mime_type,
        };
        self.send(key, to, content, None).await
    }

    pub async fn send_document(
        &self,
        key: &SessionKey,
        to: &str,
        media: MediaSource,
        file_name: impl Into<String>,
        mime_type: Option<String>,
        caption: Option<String>,
    ) -> Result<SendOutcome, CourierError> {
        let content = OutboundContent::Document {
            media,
            file_name: file_name.into(),
            mime_type,
            caption,
        };
        self.send(key, to, content, None).await
    }

    /// Send any content. `max_wait` bounds how long to wait for the
    /// connection; `None` uses the configured default.
    pub async fn send(
        &self,
        key: &SessionKey,
        to: &str,
        content: OutboundContent,
        max_wait: Option<Duration>,
    ) -> Result<SendOutcome, CourierError> {
        let inner = self.supervisor.inner();
        let peer = normalize_recipient(to, inner.settings.default_country_code.as_deref())?;
        validate_content(&content)?;

        let handle = match self.supervisor.ensure_client(key, max_wait).await {
            Ok(handle) => handle,
            Err(e) => {
                // No row means nothing to attach a log entry to.
                if !matches!(e, CourierError::NotFound { .. }) {
                    inner
                        .audit
                        .record_outbound(key, &peer, &content, Err(&e))
                        .await;
                }
                return Err(e);
            }
        };

        match handle.client().send(&peer, &content).await {
            Ok(receipt) => {
                let entry = inner
                    .audit
                    .record_outbound(key, &peer, &content, Ok(&receipt))
                    .await;
                debug!(tenant = %key.tenant, session = %key.session, to = %peer, kind = %entry.kind, "message sent");
                Ok(SendOutcome {
                    log_id: entry.id,
                    to: peer,
                    kind: entry.kind,
                    message_id: receipt.message_id,
                    created_at: entry.created_at,
                })
            }
            Err(e) => {
                warn!(tenant = %key.tenant, session = %key.session, to = %peer, error = %e, "send failed");
                inner
                    .audit
                    .record_outbound(key, &peer, &content, Err(&e))
                    .await;
                Err(CourierError::TransportSendFailure {
                    key: key.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

fn validate_content(content: &OutboundContent) -> Result<(), CourierError> {
    let (media, what) = match content {
        OutboundContent::Text { body } => {
            if body.trim().is_empty() {
                return Err(CourierError::InvalidRequest("text body is empty".into()));
            }
            return Ok(());
        }
        OutboundContent::Image { media, .. } => (media, "image"),
        OutboundContent::Document {
            media, file_name, ..
        } => {
            if file_name.trim().is_empty() {
                return Err(CourierError::InvalidRequest(
                    "document file name is empty".into(),
                ));
            }
            (media, "document")
        }
    };
    match media {
        MediaSource::Url(url) if url.trim().is_empty() => Err(CourierError::InvalidRequest(
            format!("{what} has no media"),
        )),
        MediaSource::Base64(data) if data.trim().is_empty() => Err(CourierError::InvalidRequest(
            format!("{what} has no media"),
        )),
        MediaSource::Base64(data) => BASE64
            .decode(data.trim())
            .map(|_| ())
            .map_err(|e| CourierError::InvalidRequest(format!("{what} media is not valid base64: {e}"))),
        MediaSource::Url(_) => Ok(()),
    }
}
