// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring a [`Supervisor`] to mock collaborators.
//!
//! `TestHarness` owns a temporary credential root, a [`MockTransport`] and a
//! [`MemoryStore`]. Timings default to small values so tests can run under
//! `#[tokio::test(start_paused = true)]`.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::CourierConfig;
use courier_core::traits::transport::TransportIdentity;
use courier_core::{CourierError, SessionKey, SessionStatus};
use courier_supervisor::{Supervisor, SupervisorSettings};

use crate::memory_store::MemoryStore;
use crate::mock_transport::MockTransport;

pub const TENANT: &str = "acme";

/// A connected identity with a valid phone number.
pub fn identity(number: &str) -> TransportIdentity {
    TransportIdentity {
        channel_identifier: number.to_string(),
        device_label: Some("Mock Device".to_string()),
        transport_version: Some("mock-1".to_string()),
    }
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: CourierConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = CourierConfig::default();
        config.supervisor.heartbeat_interval_secs = 30;
        config.supervisor.ensure_client_max_wait_ms = 2_000;
        config.supervisor.ensure_client_poll_ms = 50;
        config.supervisor.shutdown_close_timeout_ms = 500;
        config.notify.on_connect = false;
        Self { config }
    }

    /// Adjust the configuration before the supervisor is built.
    pub fn configure(mut self, f: impl FnOnce(&mut CourierConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the harness with a fresh credential directory.
    pub fn build(mut self) -> Result<TestHarness, CourierError> {
        let dir = tempfile::TempDir::new().map_err(CourierError::storage)?;
        self.config.credentials.root_dir = dir.path().to_string_lossy().into_owned();

        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryStore::new());
        let supervisor = Supervisor::new(
            SupervisorSettings::from_config(&self.config),
            Arc::clone(&transport) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
        );

        Ok(TestHarness {
            supervisor,
            transport,
            store,
            dir,
        })
    }
}

/// A supervisor plus handles on everything it talks to.
pub struct TestHarness {
    pub supervisor: Supervisor,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
    dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness.
    pub fn new() -> Result<Self, CourierError> {
        Self::builder().build()
    }

    pub fn key(&self, session: &str) -> SessionKey {
        SessionKey::new(TENANT, session)
    }

    /// Create a session row and return its key.
    pub async fn create(&self, session: &str) -> Result<SessionKey, CourierError> {
        let key = self.key(session);
        self.supervisor.create_session(&key, None).await?;
        Ok(key)
    }

    pub fn credentials_root(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Let spawned tasks run until they block.
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Poll the persisted status until it equals `want` or `within` passes.
    pub async fn wait_for_status(
        &self,
        key: &SessionKey,
        want: SessionStatus,
        within: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.store.status(key) == Some(want) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until `key` has an open connection or `within` passes.
    pub async fn wait_until_open(&self, key: &SessionKey, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.supervisor.status(key).await.is_ok_and(|v| v.is_running)
                && self.store.status(key) == Some(SessionStatus::Connected)
            {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Start `session` and report it opened as `number`.
    pub async fn connect(&self, session: &str, number: &str) -> Result<SessionKey, CourierError> {
        let key = self.create(session).await?;
        self.supervisor.start(&key).await?;
        self.transport.authenticate(&key, identity(number)).await;
        if !self.wait_until_open(&key, Duration::from_secs(1)).await {
            return Err(CourierError::Internal(format!("{key} never opened")));
        }
        Ok(key)
    }
}
