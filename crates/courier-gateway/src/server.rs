// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use courier_config::model::ServerConfig;
use courier_core::CourierError;
use courier_supervisor::Supervisor;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Base64 media rides inside JSON bodies.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Supervisor,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(supervisor: Supervisor, config: &ServerConfig) -> Self {
        Self {
            supervisor,
            auth: AuthConfig {
                bearer_token: config.bearer_token.clone(),
            },
        }
    }
}

/// Build the application router.
///
/// `/health` is public; everything under `/v1` requires the bearer token and
/// an `X-Tenant-Id` header.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/v1/sessions/{id}",
            get(handlers::get_status).delete(handlers::destroy_session),
        )
        .route("/v1/sessions/{id}/status", get(handlers::get_status))
        .route("/v1/sessions/{id}/start", post(handlers::start_session))
        .route("/v1/sessions/{id}/stop", post(handlers::stop_session))
        .route("/v1/sessions/{id}/qr", get(handlers::get_qr))
        .route("/v1/sessions/{id}/messages", get(handlers::list_messages))
        .route("/v1/messages/send", post(handlers::send_message))
        .route("/v1/messages/text", post(handlers::send_text))
        .route("/v1/messages/image", post(handlers::send_image))
        .route("/v1/messages/document", post(handlers::send_document))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` fires, then drain in-flight requests.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
