// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! Every failing check is collected; validation never stops at the first.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if let Some(token) = &config.server.bearer_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "server.bearer_token must not be blank when set",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.credentials.root_dir.trim().is_empty() {
        errors.push(ConfigError::validation(
            "credentials.root_dir must not be empty",
        ));
    }

    let url = config.transport.bridge_url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(ConfigError::validation(format!(
            "transport.bridge_url `{url}` must use the ws:// or wss:// scheme"
        )));
    }
    if config.transport.connect_timeout_secs == 0 || config.transport.query_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "transport timeouts must be at least 1 second",
        ));
    }

    let sup = &config.supervisor;
    if sup.heartbeat_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "supervisor.heartbeat_interval_secs must be at least 1",
        ));
    }
    if sup.ensure_client_poll_ms == 0 {
        errors.push(ConfigError::validation(
            "supervisor.ensure_client_poll_ms must be at least 1",
        ));
    } else if sup.ensure_client_poll_ms > sup.ensure_client_max_wait_ms {
        errors.push(ConfigError::validation(format!(
            "supervisor.ensure_client_poll_ms ({}) exceeds ensure_client_max_wait_ms ({})",
            sup.ensure_client_poll_ms, sup.ensure_client_max_wait_ms
        )));
    }

    let rc = &config.reconnect;
    for (name, base, max) in [
        ("fast", rc.fast_base_delay_ms, rc.fast_max_delay_ms),
        ("standard", rc.standard_base_delay_ms, rc.standard_max_delay_ms),
    ] {
        if base == 0 {
            errors.push(ConfigError::validation(format!(
                "reconnect.{name}_base_delay_ms must be at least 1"
            )));
        }
        if max < base {
            errors.push(ConfigError::validation(format!(
                "reconnect.{name}_max_delay_ms ({max}) is below {name}_base_delay_ms ({base})"
            )));
        }
    }
    let terminal: HashSet<u16> = rc.terminal_codes.iter().copied().collect();
    for code in &rc.fast_codes {
        if terminal.contains(code) {
            errors.push(ConfigError::validation(format!(
                "close code {code} is listed in both reconnect.terminal_codes and reconnect.fast_codes"
            )));
        }
    }

    if let Some(cc) = &config.messaging.default_country_code
        && (cc.is_empty() || cc.len() > 3 || !cc.chars().all(|c| c.is_ascii_digit()))
    {
        errors.push(ConfigError::validation(format!(
            "messaging.default_country_code `{cc}` must be 1-3 digits without a leading +"
        )));
    }
    if config.messaging.preview_chars == 0 {
        errors.push(ConfigError::validation(
            "messaging.preview_chars must be at least 1",
        ));
    }

    if config.notify.on_connect && config.notify.text.trim().is_empty() {
        errors.push(ConfigError::validation(
            "notify.text must not be empty while notify.on_connect is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = errors.len(), "configuration failed validation");
        Err(errors)
    }
}
