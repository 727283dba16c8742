// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier session supervisor.

use thiserror::Error;

use crate::types::SessionKey;

/// The primary error type used across all Courier crates.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport errors raised while opening or driving a connection.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No session row exists for the key.
    #[error("session not found: {key}")]
    NotFound { key: SessionKey },

    /// The requested action is not valid for the session's current state.
    #[error("invalid state for {key}: {message}")]
    InvalidState { key: SessionKey, message: String },

    /// The request itself is malformed (empty recipient, missing payload).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The session has no live connection and none could be brought up.
    #[error("session {key} is not running: {reason}")]
    NotRunning { key: SessionKey, reason: String },

    /// The recipient was accepted but the transport rejected the send.
    #[error("send via {key} failed: {message}")]
    TransportSendFailure { key: SessionKey, message: String },

    /// The connection closed for a reason that must never be retried.
    #[error("session {key} disconnected permanently (code {code:?}): {reason}")]
    TerminalDisconnect {
        key: SessionKey,
        code: Option<u16>,
        reason: String,
    },

    /// Automatic reconnection gave up after consuming its attempt budget.
    #[error("session {key} exhausted {attempts} reconnect attempts")]
    RetriesExhausted { key: SessionKey, attempts: u32 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CourierError::Storage {
            source: source.into(),
        }
    }

    /// Build a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        CourierError::Transport {
            message: message.into(),
            source: None,
        }
    }
}
