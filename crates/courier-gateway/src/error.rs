// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`CourierError`] to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courier_core::CourierError;
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error kind.
    pub kind: &'static str,
}

/// A [`CourierError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub CourierError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(CourierError::InvalidRequest(message.into()))
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            CourierError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            CourierError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            CourierError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            CourierError::NotRunning { .. } => (StatusCode::CONFLICT, "not_running"),
            CourierError::TerminalDisconnect { .. } => {
                (StatusCode::CONFLICT, "terminal_disconnect")
            }
            CourierError::RetriesExhausted { .. } => (StatusCode::CONFLICT, "retries_exhausted"),
            CourierError::TransportSendFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "send_failed")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<CourierError> for ApiError {
    fn from(err: CourierError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind,
            }),
        )
            .into_response()
    }
}
