// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the session and messaging API.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use courier_core::traits::transport::{MediaSource, OutboundContent};
use courier_core::{CourierError, MessageLogEntry, SessionKey};
use courier_supervisor::{SendOutcome, SessionView};
use qrcode::QrCode;
use qrcode::render::svg;
use serde::{Deserialize, Serialize};

use crate::auth::Tenant;
use crate::error::{ApiError, ErrorResponse};
use crate::server::AppState;

type ApiResult<T> = Result<T, ApiError>;

fn key(tenant: Tenant, id: String) -> SessionKey {
    SessionKey::new(tenant.0, id)
}

/// Body for `POST /v1/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageLogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QrQuery {
    /// `svg` (default) or `json`.
    #[serde(default)]
    pub format: Option<String>,
}

/// GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub live_sessions: usize,
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.supervisor.uptime().as_secs(),
        live_sessions: state.supervisor.live_count(),
    })
}

/// GET /v1/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    tenant: Tenant,
) -> ApiResult<Json<SessionListResponse>> {
    let sessions = state.supervisor.list_sessions(&tenant.0).await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// POST /v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let key = key(tenant, body.id);
    let record = state.supervisor.create_session(&key, body.name).await?;
    Ok((StatusCode::CREATED, Json(SessionView::new(record, false, false))))
}

/// GET /v1/sessions/{id} and GET /v1/sessions/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.supervisor.status(&key(tenant, id)).await?))
}

/// POST /v1/sessions/{id}/start
pub async fn start_session(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let key = key(tenant, id);
    state.supervisor.start(&key).await?;
    Ok(Json(state.supervisor.status(&key).await?))
}

/// POST /v1/sessions/{id}/stop
pub async fn stop_session(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<Json<StopResponse>> {
    let key = key(tenant, id);
    // Unknown sessions are a 404, not a no-op.
    state.supervisor.status(&key).await?;
    let stopped = state.supervisor.stop(&key).await?;
    Ok(Json(StopResponse { stopped }))
}

/// DELETE /v1/sessions/{id}
pub async fn destroy_session(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.supervisor.destroy(&key(tenant, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/sessions/{id}/qr
///
/// Renders the cached pairing code as SVG, or as JSON with `?format=json`.
pub async fn get_qr(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Query(query): Query<QrQuery>,
) -> ApiResult<Response> {
    let key = key(tenant, id);
    state.supervisor.status(&key).await?;
    let Some(pairing) = state.supervisor.pairing_code(&key) else {
        let body = ErrorResponse {
            error: format!("no pairing code available for {key}"),
            kind: "no_pairing_code",
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };

    match query.format.as_deref() {
        Some("json") => Ok(Json(pairing).into_response()),
        None | Some("svg") => {
            let image = render_svg(&pairing.code)?;
            Ok(([(header::CONTENT_TYPE, "image/svg+xml")], image).into_response())
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "unknown qr format '{other}', expected svg or json"
        ))),
    }
}

fn render_svg(code: &str) -> ApiResult<String> {
    let qr = QrCode::new(code.as_bytes())
        .map_err(|e| ApiError(CourierError::Internal(format!("encode pairing code: {e}"))))?;
    Ok(qr.render::<svg::Color>().min_dimensions(256, 256).build())
}

/// GET /v1/sessions/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessageListResponse>> {
    let messages = state.supervisor.messages(&key(tenant, id), query.limit).await?;
    Ok(Json(MessageListResponse { messages }))
}

/// Body for `POST /v1/messages/send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub session_id: String,
    pub to: String,
    pub content: OutboundContent,
    /// Override for how long to wait for the session to come up.
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub session_id: String,
    pub to: String,
    pub body: String,
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub session_id: String,
    pub to: String,
    pub media: MediaSource,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    pub session_id: String,
    pub to: String,
    pub media: MediaSource,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

/// Requests may wait at most this many times the configured default.
const MAX_WAIT_FACTOR: u32 = 4;

async fn deliver(state: &AppState, tenant: Tenant, req: SendRequest) -> ApiResult<Json<SendOutcome>> {
    let key = key(tenant, req.session_id);
    let max_wait = req.max_wait_ms.map(Duration::from_millis);
    let ceiling = state
        .supervisor
        .settings()
        .ensure_client_max_wait
        .saturating_mul(MAX_WAIT_FACTOR);
    if max_wait.is_some_and(|wait| wait > ceiling) {
        return Err(ApiError::bad_request(format!(
            "max_wait_ms must not exceed {}",
            ceiling.as_millis()
        )));
    }
    let outcome = state
        .supervisor
        .gateway()
        .send(&key, &req.to, req.content, max_wait)
        .await?;
    Ok(Json(outcome))
}

/// POST /v1/messages/send
pub async fn send_message(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<SendRequest>,
) -> ApiResult<Json<SendOutcome>> {
    deliver(&state, tenant, body).await
}

/// POST /v1/messages/text
pub async fn send_text(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<TextRequest>,
) -> ApiResult<Json<SendOutcome>> {
    let req = SendRequest {
        session_id: body.session_id,
        to: body.to,
        content: OutboundContent::Text { body: body.body },
        max_wait_ms: body.max_wait_ms,
    };
    deliver(&state, tenant, req).await
}

/// POST /v1/messages/image
pub async fn send_image(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<ImageRequest>,
) -> ApiResult<Json<SendOutcome>> {
    let req = SendRequest {
        session_id: body.session_id,
        to: body.to,
        content: OutboundContent::Image {
            media: body.media,
            caption: body.caption,
            mime_type: body.mime_type,
        },
        max_wait_ms: body.max_wait_ms,
    };
    deliver(&state, tenant, req).await
}

/// POST /v1/messages/document
pub async fn send_document(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<DocumentRequest>,
) -> ApiResult<Json<SendOutcome>> {
    let req = SendRequest {
        session_id: body.session_id,
        to: body.to,
        content: OutboundContent::Document {
            media: body.media,
            file_name: body.file_name,
            mime_type: body.mime_type,
            caption: body.caption,
        },
        max_wait_ms: body.max_wait_ms,
    };
    deliver(&state, tenant, req).await
}
