// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later layers override earlier ones:
//! 1. Compiled defaults
//! 2. `/etc/courier/courier.toml`
//! 3. `~/.config/courier/courier.toml`
//! 4. `./courier.toml`
//! 5. `COURIER_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CourierConfig;

/// Config sections addressable from environment variables.
const SECTIONS: &[&str] = &[
    "server",
    "storage",
    "credentials",
    "transport",
    "supervisor",
    "reconnect",
    "messaging",
    "notify",
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/courier/courier.toml";
pub(crate) const LOCAL_CONFIG: &str = "courier.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("courier/courier.toml"))
        .unwrap_or_default()
}

/// Build the standard figment without extracting it.
pub fn build_figment() -> Figment {
    let user = user_config_path();
    for path in [Path::new(SYSTEM_CONFIG), user.as_path(), Path::new(LOCAL_CONFIG)] {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "config layer found");
        }
    }
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from one explicit file, still honoring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading explicit config file");
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string over the defaults. No env lookup.
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `COURIER_SUPERVISOR_RESTORE_ON_BOOT` maps to `supervisor.restore_on_boot`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that themselves contain underscores survive intact.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
