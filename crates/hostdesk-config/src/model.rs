// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Hostdesk pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Hostdesk configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostdeskConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Worker pool and retention settings per queue.
    #[serde(default)]
    pub queues: QueuesConfig,

    /// WhatsApp Cloud API settings shared by all channels.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Channel directory: receiving phone number id to tenant and credentials.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Real-time event fan-out settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Automation agent that receives customer messages.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Messenger pages and Instagram accounts and the tenants that own them.
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

impl HostdeskConfig {
    /// Tenant owning the channel that received a webhook.
    pub fn tenant_for_phone_number_id(&self, phone_number_id: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.phone_number_id == phone_number_id)
            .map(|c| c.tenant_id.as_str())
    }

    /// Page entry for a Messenger page or Instagram account id.
    pub fn page(&self, channel: PageChannel, page_id: &str) -> Option<&PageConfig> {
        self.pages
            .iter()
            .find(|p| p.channel == channel && p.page_id == page_id)
    }

    /// Channel credentials used to send on behalf of a tenant.
    pub fn channel_for_tenant(&self, tenant_id: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.tenant_id == tenant_id)
    }

    /// Serializes the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// HTTP server and logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("hostdesk").join("hostdesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("hostdesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Retry and concurrency policy of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueuePolicy {
    /// Maximum number of jobs processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts before a job is marked failed.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Base delay of the exponential retry backoff.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Idle polling interval of each worker.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl QueuePolicy {
    pub fn new(concurrency: usize, attempts: u32, backoff_ms: u64) -> Self {
        Self {
            concurrency,
            attempts,
            backoff_ms,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self::new(default_concurrency(), default_attempts(), default_backoff_ms())
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Queue runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueuesConfig {
    #[serde(default = "default_incoming_policy")]
    pub incoming: QueuePolicy,

    #[serde(default = "default_status_policy")]
    pub status: QueuePolicy,

    #[serde(default = "default_outgoing_policy")]
    pub outgoing: QueuePolicy,

    #[serde(default = "default_media_policy")]
    pub media: QueuePolicy,

    #[serde(default = "default_ia_reactivation_policy")]
    pub ia_reactivation: QueuePolicy,

    #[serde(default = "default_page_policy")]
    pub messenger: QueuePolicy,

    #[serde(default = "default_page_policy")]
    pub instagram: QueuePolicy,

    /// Lease held by a worker on a claimed job. Expired leases are recovered.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    #[serde(default = "default_completed_retention_hours")]
    pub completed_retention_hours: u64,

    #[serde(default = "default_failed_retention_days")]
    pub failed_retention_days: u64,

    /// Interval of the finished-job cleanup task.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            incoming: default_incoming_policy(),
            status: default_status_policy(),
            outgoing: default_outgoing_policy(),
            media: default_media_policy(),
            ia_reactivation: default_ia_reactivation_policy(),
            messenger: default_page_policy(),
            instagram: default_page_policy(),
            lock_timeout_secs: default_lock_timeout_secs(),
            completed_retention_hours: default_completed_retention_hours(),
            failed_retention_days: default_failed_retention_days(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_incoming_policy() -> QueuePolicy {
    QueuePolicy::new(5, 3, 2000)
}

fn default_status_policy() -> QueuePolicy {
    QueuePolicy::new(10, 3, 2000)
}

fn default_outgoing_policy() -> QueuePolicy {
    QueuePolicy::new(3, 3, 2000)
}

fn default_media_policy() -> QueuePolicy {
    QueuePolicy::new(2, 5, 5000)
}

fn default_ia_reactivation_policy() -> QueuePolicy {
    QueuePolicy::new(1, 3, 2000)
}

fn default_page_policy() -> QueuePolicy {
    QueuePolicy::new(5, 3, 2000)
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_completed_retention_hours() -> u64 {
    24
}

fn default_failed_retention_days() -> u64 {
    7
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Token echoed back during webhook verification.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` checks. Unset disables them.
    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            verify_token: None,
            app_secret: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v21.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// One receiving WhatsApp number and the tenant that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub phone_number_id: String,
    pub tenant_id: String,
    pub access_token: String,
}

/// Meta messaging surface served through a page webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageChannel {
    Messenger,
    Instagram,
}

/// One Messenger page or Instagram account and the tenant that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PageConfig {
    /// Id reported as `entry[].id` in page webhooks.
    pub page_id: String,
    pub tenant_id: String,
    pub channel: PageChannel,
}

/// Downloaded media storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Prefix of public media URLs recorded on messages.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            public_base_url: default_public_base_url(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_storage_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("hostdesk").join("media"))
        .unwrap_or_else(|| std::path::PathBuf::from("media"))
        .to_string_lossy()
        .into_owned()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:3000/media".to_string()
}

fn default_retention_days() -> u64 {
    30
}

/// A hotel unit that customers can select, with the ids and spellings that
/// identify it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HotelUnitConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl HotelUnitConfig {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// IA lock and escalation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    /// Delay of the reactivation job scheduled with a follow-up lock.
    #[serde(default = "default_followup_delay_secs")]
    pub followup_delay_secs: u64,

    /// Phrases that mean the customer asked for a person.
    #[serde(default = "default_human_request_keywords")]
    pub human_request_keywords: Vec<String>,

    #[serde(default = "default_hotel_units")]
    pub hotel_units: Vec<HotelUnitConfig>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            followup_delay_secs: default_followup_delay_secs(),
            human_request_keywords: default_human_request_keywords(),
            hotel_units: default_hotel_units(),
        }
    }
}

fn default_followup_delay_secs() -> u64 {
    3600
}

fn default_human_request_keywords() -> Vec<String> {
    [
        "humano",
        "atendente",
        "vendedor",
        "pessoa",
        "falar com alguem",
        "quero falar",
        "atendimento humano",
        "pessoa real",
        "falar com uma pessoa",
        "quero atendente",
        "me transfere",
        "transferir",
        "operador",
        "falar com gente",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_hotel_units() -> Vec<HotelUnitConfig> {
    vec![
        HotelUnitConfig::new("Ilhabela", &["ilha_bela", "ilhabela"]),
        HotelUnitConfig::new("Campos do Jordão", &["campos_jordao", "camposdojordao"]),
        HotelUnitConfig::new("Camburi", &["camburi"]),
        HotelUnitConfig::new(
            "Santo Antônio do Pinhal",
            &["santo_antonio", "santoantonio", "santo_antonio_pinhal"],
        ),
        HotelUnitConfig::new(
            "Santa Smart Hotel",
            &["santa", "santa_smart", "santasmart", "santa_smart_hotel", "st"],
        ),
    ]
}

/// Outbound hand-off of customer messages to the automation agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Webhook receiving each message. Unset disables forwarding.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

fn default_agent_timeout_secs() -> u64 {
    10
}

/// Event bus capacities.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Bounded publisher queue between workers and the room hub.
    #[serde(default = "default_publisher_capacity")]
    pub publisher_capacity: usize,

    /// Per-room broadcast buffer. Slow subscribers lag past this.
    #[serde(default = "default_room_capacity")]
    pub room_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            publisher_capacity: default_publisher_capacity(),
            room_capacity: default_room_capacity(),
        }
    }
}

fn default_publisher_capacity() -> usize {
    1024
}

fn default_room_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_defaults_match_workload() {
        let q = QueuesConfig::default();
        assert_eq!(q.incoming.concurrency, 5);
        assert_eq!(q.status.concurrency, 10);
        assert_eq!(q.outgoing.concurrency, 3);
        assert_eq!(q.media, QueuePolicy::new(2, 5, 5000));
        assert_eq!(q.ia_reactivation.concurrency, 1);
    }

    #[test]
    fn channel_directory_lookups() {
        let config = HostdeskConfig {
            channels: vec![ChannelConfig {
                phone_number_id: "1001".into(),
                tenant_id: "hotel-a".into(),
                access_token: "tok".into(),
            }],
            ..Default::default()
        };
        assert_eq!(config.tenant_for_phone_number_id("1001"), Some("hotel-a"));
        assert_eq!(config.tenant_for_phone_number_id("9999"), None);
        assert_eq!(
            config.channel_for_tenant("hotel-a").map(|c| c.access_token.as_str()),
            Some("tok")
        );
    }

    #[test]
    fn default_config_renders_as_toml() {
        let rendered = HostdeskConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[queues.media]"));
        assert!(rendered.contains("followup_delay_secs = 3600"));
        assert!(rendered.contains("[queues.instagram]"));
    }

    #[test]
    fn agent_forwarding_is_off_by_default() {
        let agent = AgentConfig::default();
        assert_eq!(agent.webhook_url, None);
        assert_eq!(agent.timeout_secs, 10);
    }

    #[test]
    fn page_lookup_is_scoped_by_channel() {
        let config: HostdeskConfig = toml::from_str(
            r#"
[[pages]]
page_id = "555"
tenant_id = "hotel-a"
channel = "messenger"

[[pages]]
page_id = "555"
tenant_id = "hotel-b"
channel = "instagram"
"#,
        )
        .unwrap();
        let tenant = |channel| config.page(channel, "555").map(|p| p.tenant_id.as_str());
        assert_eq!(tenant(PageChannel::Messenger), Some("hotel-a"));
        assert_eq!(tenant(PageChannel::Instagram), Some("hotel-b"));
        assert!(config.page(PageChannel::Messenger, "556").is_none());
    }
}
