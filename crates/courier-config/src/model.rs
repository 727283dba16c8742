// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Courier.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section defaults to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// HTTP control surface settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-session credential directories.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Messaging transport connection settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Supervisor timing and lifecycle settings.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Reconnect classification and backoff settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Outbound message handling.
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// "Connected" notice sent when a session comes up.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// HTTP control surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on API routes. `None` rejects every API call.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8480
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    data_root().join("courier.db").to_string_lossy().into_owned()
}

/// Credential storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Root directory; each session gets `<root>/<tenant>/<session>/`.
    #[serde(default = "default_credentials_root")]
    pub root_dir: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_credentials_root(),
        }
    }
}

fn default_credentials_root() -> String {
    data_root().join("credentials").to_string_lossy().into_owned()
}

fn data_root() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|p| p.join("courier"))
        .unwrap_or_else(|| std::path::PathBuf::from("./courier-data"))
}

/// Transport connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// WebSocket endpoint of the session-protocol sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Timeout for establishing a connection.
    #[serde(default = "default_transport_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout for a single request/response round trip.
    #[serde(default = "default_transport_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Transport-level keep-alive interval.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,

    /// How many times the transport may retry a failed send on its own.
    #[serde(default = "default_max_send_retries")]
    pub max_send_retries: u32,

    /// Download the full message history on first pairing.
    #[serde(default)]
    pub sync_full_history: bool,

    /// Generate link previews for outbound text.
    #[serde(default)]
    pub generate_link_previews: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            connect_timeout_secs: default_transport_timeout_secs(),
            query_timeout_secs: default_transport_timeout_secs(),
            keepalive_interval_secs: default_keepalive_secs(),
            max_send_retries: default_max_send_retries(),
            sync_full_history: false,
            generate_link_previews: false,
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:7400/session".to_string()
}

fn default_transport_timeout_secs() -> u64 {
    60
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_max_send_retries() -> u32 {
    2
}

/// Supervisor timing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Interval between heartbeat pings on a live connection.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,

    /// Default bound on how long a send waits for a connection to come up.
    #[serde(default = "default_ensure_wait_ms")]
    pub ensure_client_max_wait_ms: u64,

    /// Poll interval while waiting for a connection.
    #[serde(default = "default_ensure_poll_ms")]
    pub ensure_client_poll_ms: u64,

    /// Restart previously connected sessions when the process boots.
    #[serde(default = "default_true")]
    pub restore_on_boot: bool,

    /// How long shutdown waits for each connection to close.
    #[serde(default = "default_close_timeout_ms")]
    pub shutdown_close_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_secs(),
            ensure_client_max_wait_ms: default_ensure_wait_ms(),
            ensure_client_poll_ms: default_ensure_poll_ms(),
            restore_on_boot: true,
            shutdown_close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl SupervisorConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn ensure_client_max_wait(&self) -> Duration {
        Duration::from_millis(self.ensure_client_max_wait_ms)
    }

    pub fn ensure_client_poll(&self) -> Duration {
        Duration::from_millis(self.ensure_client_poll_ms)
    }

    pub fn shutdown_close_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_close_timeout_ms)
    }
}

fn default_heartbeat_secs() -> u64 {
    25
}

fn default_ensure_wait_ms() -> u64 {
    15_000
}

fn default_ensure_poll_ms() -> u64 {
    500
}

fn default_close_timeout_ms() -> u64 {
    5_000
}

/// Reconnect classification and backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Attempt budget for the fast class.
    #[serde(default = "default_fast_attempts")]
    pub fast_max_attempts: u32,

    /// Linear step for the fast class.
    #[serde(default = "default_fast_base_ms")]
    pub fast_base_delay_ms: u64,

    /// Ceiling for the fast class.
    #[serde(default = "default_fast_max_ms")]
    pub fast_max_delay_ms: u64,

    /// Attempt budget for every other retryable close.
    #[serde(default = "default_standard_attempts")]
    pub standard_max_attempts: u32,

    /// First delay of the exponential schedule.
    #[serde(default = "default_standard_base_ms")]
    pub standard_base_delay_ms: u64,

    /// Ceiling of the exponential schedule.
    #[serde(default = "default_standard_max_ms")]
    pub standard_max_delay_ms: u64,

    /// Close codes that are never retried.
    #[serde(default = "default_terminal_codes")]
    pub terminal_codes: Vec<u16>,

    /// Close codes retried on the fast schedule.
    #[serde(default = "default_fast_codes")]
    pub fast_codes: Vec<u16>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            fast_max_attempts: default_fast_attempts(),
            fast_base_delay_ms: default_fast_base_ms(),
            fast_max_delay_ms: default_fast_max_ms(),
            standard_max_attempts: default_standard_attempts(),
            standard_base_delay_ms: default_standard_base_ms(),
            standard_max_delay_ms: default_standard_max_ms(),
            terminal_codes: default_terminal_codes(),
            fast_codes: default_fast_codes(),
        }
    }
}

fn default_fast_attempts() -> u32 {
    3
}

fn default_fast_base_ms() -> u64 {
    1_000
}

fn default_fast_max_ms() -> u64 {
    3_000
}

fn default_standard_attempts() -> u32 {
    10
}

fn default_standard_base_ms() -> u64 {
    2_000
}

fn default_standard_max_ms() -> u64 {
    300_000
}

// 401 logged out, 403 forbidden, 411 multi-device mismatch,
// 440 replaced by another login, 500 corrupted local credentials.
fn default_terminal_codes() -> Vec<u16> {
    vec![401, 403, 411, 440, 500]
}

// 515: stream restart demanded right after pairing.
fn default_fast_codes() -> Vec<u16> {
    vec![515]
}

/// Outbound message handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagingConfig {
    /// Country calling code applied to national numbers with a leading `0`.
    #[serde(default)]
    pub default_country_code: Option<String>,

    /// Maximum characters kept in an audit log preview.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            default_country_code: None,
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_preview_chars() -> usize {
    120
}

/// Connected-notice configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// Send a notice when a session connects.
    #[serde(default = "default_true")]
    pub on_connect: bool,

    /// Recipient of the notice. `None` sends it to the session's own number.
    #[serde(default)]
    pub recipient: Option<String>,

    /// Notice text. `{session}` and `{identifier}` are substituted.
    #[serde(default = "default_notice_text")]
    pub text: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            on_connect: true,
            recipient: None,
            text: default_notice_text(),
        }
    }
}

fn default_notice_text() -> String {
    "Session {session} is connected as {identifier}.".to_string()
}

fn default_true() -> bool {
    true
}
