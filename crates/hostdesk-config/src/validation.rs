// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as bind hosts, non-empty paths and a consistent channel directory.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{HostdeskConfig, QueuePolicy};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every error instead of failing fast.
pub fn validate_config(config: &HostdeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(validation("server.host must not be empty".to_string()));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation(
            "storage.database_path must not be empty".to_string(),
        ));
    }

    if config.media.storage_dir.trim().is_empty() {
        errors.push(validation("media.storage_dir must not be empty".to_string()));
    }

    let queues = &config.queues;
    for (name, policy) in [
        ("incoming", &queues.incoming),
        ("status", &queues.status),
        ("outgoing", &queues.outgoing),
        ("media", &queues.media),
        ("ia_reactivation", &queues.ia_reactivation),
        ("messenger", &queues.messenger),
        ("instagram", &queues.instagram),
    ] {
        validate_policy(name, policy, &mut errors);
    }

    if queues.lock_timeout_secs == 0 {
        errors.push(validation(
            "queues.lock_timeout_secs must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, channel) in config.channels.iter().enumerate() {
        if channel.phone_number_id.trim().is_empty() {
            errors.push(validation(format!(
                "channels[{i}].phone_number_id must not be empty"
            )));
        } else if !seen.insert(channel.phone_number_id.as_str()) {
            errors.push(ConfigError::DuplicateChannel {
                phone_number_id: channel.phone_number_id.clone(),
            });
        }
        if channel.tenant_id.trim().is_empty() {
            errors.push(validation(format!("channels[{i}].tenant_id must not be empty")));
        }
    }

    let mut pages = HashSet::new();
    for (i, page) in config.pages.iter().enumerate() {
        if page.page_id.trim().is_empty() {
            errors.push(validation(format!("pages[{i}].page_id must not be empty")));
        } else if !pages.insert((page.channel, page.page_id.as_str())) {
            errors.push(validation(format!(
                "pages[{i}]: page `{}` is already mapped for this channel",
                page.page_id
            )));
        }
        if page.tenant_id.trim().is_empty() {
            errors.push(validation(format!("pages[{i}].tenant_id must not be empty")));
        }
    }

    if let Some(url) = &config.agent.webhook_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(validation(format!(
            "agent.webhook_url `{url}` must be an http or https URL"
        )));
    }
    if config.agent.timeout_secs == 0 {
        errors.push(validation("agent.timeout_secs must be at least 1".to_string()));
    }

    for (i, unit) in config.escalation.hotel_units.iter().enumerate() {
        if unit.name.trim().is_empty() {
            errors.push(validation(format!(
                "escalation.hotel_units[{i}].name must not be empty"
            )));
        }
    }

    if config.bus.publisher_capacity == 0 || config.bus.room_capacity == 0 {
        errors.push(validation(
            "bus.publisher_capacity and bus.room_capacity must be at least 1".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_policy(name: &str, policy: &QueuePolicy, errors: &mut Vec<ConfigError>) {
    if policy.concurrency == 0 {
        errors.push(validation(format!(
            "queues.{name}.concurrency must be at least 1"
        )));
    }
    if policy.attempts == 0 {
        errors.push(validation(format!("queues.{name}.attempts must be at least 1")));
    }
    if policy.poll_interval_ms == 0 {
        errors.push(validation(format!(
            "queues.{name}.poll_interval_ms must be at least 1"
        )));
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelConfig, PageChannel, PageConfig};

    fn channel(id: &str, tenant: &str) -> ChannelConfig {
        ChannelConfig {
            phone_number_id: id.into(),
            tenant_id: tenant.into(),
            access_token: "tok".into(),
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&HostdeskConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = HostdeskConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("storage.database_path"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = HostdeskConfig::default();
        config.queues.media.concurrency = 0;
        config.queues.outgoing.attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn duplicate_channel_is_reported() {
        let mut config = HostdeskConfig::default();
        config.channels = vec![channel("1001", "a"), channel("1001", "b")];
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ConfigError::DuplicateChannel { phone_number_id } if phone_number_id == "1001"
        ));
    }

    #[test]
    fn invalid_host_and_empty_tenant_are_collected() {
        let mut config = HostdeskConfig::default();
        config.server.host = "not a host!".to_string();
        config.channels = vec![channel("1001", "")];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn page_ids_are_unique_per_channel() {
        let page = |id: &str, channel| PageConfig {
            page_id: id.into(),
            tenant_id: "hotel-a".into(),
            channel,
        };
        let mut config = HostdeskConfig::default();
        config.pages = vec![
            page("77", PageChannel::Messenger),
            page("77", PageChannel::Instagram),
        ];
        assert!(validate_config(&config).is_ok());

        config.pages.push(page("77", PageChannel::Messenger));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("pages[2]"));
    }

    #[test]
    fn agent_webhook_must_be_http() {
        let mut config = HostdeskConfig::default();
        config.agent.webhook_url = Some("ftp://agent".to_string());
        config.agent.timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("agent.webhook_url"));
    }
}
