// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keep-alive pings for one open connection.

use std::time::Duration;

use tracing::{debug, warn};

use crate::registry::ConnectionHandle;

/// Ping `handle` every `period` until its lifetime is cancelled.
///
/// A failed ping is only logged; the transport reports a dead socket as a
/// `Closed` event, which is what tears the connection down.
pub async fn run(handle: ConnectionHandle, period: Duration) {
    let key = handle.key().clone();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = handle.lifetime().cancelled() => break,
            _ = interval.tick() => {
                match handle.client().ping().await {
                    Ok(()) => debug!(tenant = %key.tenant, session = %key.session, "heartbeat ok"),
                    Err(e) => warn!(tenant = %key.tenant, session = %key.session, error = %e, "heartbeat ping failed"),
                }
            }
        }
    }
    debug!(tenant = %key.tenant, session = %key.session, "heartbeat stopped");
}

/// Spawn [`run`] on the current runtime.
pub fn spawn(handle: ConnectionHandle, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(handle, period))
}
