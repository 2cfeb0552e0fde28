// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named queues of the pipeline.

use hostdesk_config::model::{QueuePolicy, QueuesConfig};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum QueueName {
    #[strum(serialize = "whatsapp:incoming:message")]
    Incoming,
    #[strum(serialize = "whatsapp:status:update")]
    Status,
    #[strum(serialize = "whatsapp:outgoing:message")]
    Outgoing,
    #[strum(serialize = "whatsapp:media:download")]
    Media,
    #[strum(serialize = "ia:reactivation")]
    IaReactivation,
    #[strum(serialize = "messenger:incoming:message")]
    Messenger,
    #[strum(serialize = "instagram:incoming:message")]
    Instagram,
}

impl QueueName {
    pub const ALL: [QueueName; 7] = [
        QueueName::Incoming,
        QueueName::Status,
        QueueName::Outgoing,
        QueueName::Media,
        QueueName::IaReactivation,
        QueueName::Messenger,
        QueueName::Instagram,
    ];

    /// Short name used in configuration sections and the CLI.
    pub fn key(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Status => "status",
            Self::Outgoing => "outgoing",
            Self::Media => "media",
            Self::IaReactivation => "ia_reactivation",
            Self::Messenger => "messenger",
            Self::Instagram => "instagram",
        }
    }

    /// Resolves either the short key or the full queue name.
    pub fn lookup(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.key() == raw)
            .or_else(|| raw.parse().ok())
    }

    pub fn policy(self, config: &QueuesConfig) -> &QueuePolicy {
        match self {
            Self::Incoming => &config.incoming,
            Self::Status => &config.status,
            Self::Outgoing => &config.outgoing,
            Self::Media => &config.media,
            Self::IaReactivation => &config.ia_reactivation,
            Self::Messenger => &config.messenger,
            Self::Instagram => &config.instagram,
        }
    }
}
