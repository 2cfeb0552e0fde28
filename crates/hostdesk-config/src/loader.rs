// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./hostdesk.toml` > `~/.config/hostdesk/hostdesk.toml` >
//! `/etc/hostdesk/hostdesk.toml` with environment variable overrides via `HOSTDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HostdeskConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/hostdesk/hostdesk.toml` (system-wide)
/// 3. `~/.config/hostdesk/hostdesk.toml` (user XDG config)
/// 4. `./hostdesk.toml` (local directory)
/// 5. `HOSTDESK_*` environment variables
pub fn load_config() -> Result<HostdeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults.
pub fn load_config_from_str(toml_content: &str) -> Result<HostdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HostdeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HostdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HostdeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HostdeskConfig::default()))
        .merge(Toml::file("/etc/hostdesk/hostdesk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("hostdesk/hostdesk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("hostdesk.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `HOSTDESK_WHATSAPP_APP_SECRET`
/// must map to `whatsapp.app_secret`, not `whatsapp.app.secret`. Queue policies
/// nest one level deeper, e.g. `HOSTDESK_QUEUES_MEDIA_CONCURRENCY`.
fn env_provider() -> Env {
    Env::prefixed("HOSTDESK_").map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

const SECTIONS: &[&str] = &[
    "server",
    "storage",
    "whatsapp",
    "media",
    "escalation",
    "bus",
    "agent",
];

const QUEUE_NAMES: &[&str] = &[
    "ia_reactivation",
    "incoming",
    "status",
    "outgoing",
    "media",
    "messenger",
    "instagram",
];

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    if let Some(rest) = key.strip_prefix("queues_") {
        for queue in QUEUE_NAMES {
            if let Some(field) = rest.strip_prefix(queue).and_then(|r| r.strip_prefix('_')) {
                return format!("queues.{queue}.{field}");
            }
        }
        return format!("queues.{rest}");
    }
    for section in SECTIONS {
        if let Some(field) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
