// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve`: wire storage, transport, supervisor and HTTP together.

use std::sync::Arc;

use courier_bridge::BridgeTransport;
use courier_config::CourierConfig;
use courier_core::{Adapter, CourierError};
use courier_gateway::AppState;
use courier_storage::SqliteStore;
use courier_supervisor::shutdown::install_signal_handler;
use courier_supervisor::{Supervisor, SupervisorSettings};
use tracing::{info, warn};

pub async fn run(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    if config.server.bearer_token.is_none() {
        warn!("server.bearer_token is not set; every API request will be rejected");
    }

    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    let transport = Arc::new(BridgeTransport::new(config.transport.bridge_url.clone()));
    let supervisor = Supervisor::new(
        SupervisorSettings::from_config(&config),
        Arc::clone(&transport) as _,
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
    );

    let restored = supervisor.init().await?;
    info!(restored, "supervisor ready");

    let shutdown = install_signal_handler();
    let state = AppState::new(supervisor.clone(), &config.server);
    let served = courier_gateway::serve(&config.server, state, shutdown.clone()).await;
    // The server may also have stopped on its own error.
    shutdown.cancel();

    supervisor.shutdown().await;
    if let Err(e) = transport.shutdown().await {
        warn!(error = %e, "transport shutdown failed");
    }
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }
    info!("courier stopped");
    served
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
