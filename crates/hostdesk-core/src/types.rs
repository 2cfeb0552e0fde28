// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the processors and the event bus.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// `iaLockedBy` value for escalation-triggered locks.
pub const LOCKED_BY_SYSTEM: &str = "system";

/// `iaLockedBy` value for time-bounded follow-up locks.
pub const LOCKED_BY_FOLLOWUP: &str = "system:followup";

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
}

/// Messaging channel a contact writes from.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    #[default]
    #[strum(serialize = "WHATSAPP")]
    #[serde(rename = "WHATSAPP")]
    WhatsApp,
    Messenger,
    Instagram,
}

impl Channel {
    /// Lowercase name used in message metadata and agent payloads.
    pub fn key(self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Messenger => "messenger",
            Self::Instagram => "instagram",
        }
    }
}

/// Conversation lifecycle.
///
/// `BotHandling`, `Open`, `InProgress` and `Waiting` are the active states:
/// at most one conversation per contact may be in any of them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    BotHandling,
    Open,
    InProgress,
    Waiting,
    Closed,
    Archived,
}

impl ConversationStatus {
    /// Statuses that count toward the single-active-conversation rule.
    pub const ACTIVE: [ConversationStatus; 4] = [
        ConversationStatus::BotHandling,
        ConversationStatus::Open,
        ConversationStatus::InProgress,
        ConversationStatus::Waiting,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Closed or archived conversations are ignored by delayed jobs.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Closed | Self::Archived)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Interactive,
    Template,
}

/// Delivery status of a message.
///
/// `Pending` is only used for outbound messages that are queued but not yet
/// accepted by the provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationStatus {
    Pending,
    InProgress,
    Resolved,
    Cancelled,
}

impl EscalationStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationReason {
    UserRequested,
    AiUnable,
    ComplexQuery,
    Complaint,
    SalesOpportunity,
    Urgency,
    Other,
}

/// Actor holding the IA lock of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockOwner {
    /// Escalation-triggered lock (`system`).
    System,
    /// Automatic, time-bounded lock (`system:followup`).
    Followup,
    /// A human attendant, by user id.
    User(String),
}

impl LockOwner {
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => LOCKED_BY_SYSTEM,
            Self::Followup => LOCKED_BY_FOLLOWUP,
            Self::User(id) => id,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            LOCKED_BY_SYSTEM => Self::System,
            LOCKED_BY_FOLLOWUP => Self::Followup,
            other => Self::User(other.to_string()),
        }
    }
}

impl std::fmt::Display for LockOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Entities ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub tenant_id: String,
    pub channel: Channel,
    /// Set for WhatsApp contacts only.
    pub phone_number: Option<String>,
    /// Page-scoped sender id for Messenger and Instagram contacts.
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub contact_id: String,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub assigned_to_id: Option<String>,
    pub hotel_unit: Option<String>,
    pub ia_locked: bool,
    pub ia_locked_at: Option<DateTime<Utc>>,
    pub ia_locked_by: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Current lock holder, `None` when the automated agent may respond.
    pub fn lock_owner(&self) -> Option<LockOwner> {
        if !self.ia_locked {
            return None;
        }
        self.ia_locked_by.as_deref().map(LockOwner::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub external_message_id: Option<String>,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub metadata: Value,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub reason: EscalationReason,
    pub reason_detail: Option<String>,
    pub hotel_unit: Option<String>,
    pub status: EscalationStatus,
    pub priority: Priority,
    pub ai_context: Option<Value>,
    pub attended_by_id: Option<String>,
    pub attended_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Store inputs ---

/// A message row to insert. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub tenant_id: String,
    pub conversation_id: String,
    pub external_message_id: Option<String>,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub metadata: Value,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// Result of inserting a message keyed by its external id.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Message),
    /// A message with the same external id already exists for the tenant.
    Duplicate(Message),
}

/// IA lock mutation applied as part of a conversation patch.
#[derive(Debug, Clone, PartialEq)]
pub enum IaLockChange {
    Lock { by: LockOwner, at: DateTime<Utc> },
    Unlock,
}

/// Partial conversation update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub status: Option<ConversationStatus>,
    pub priority: Option<Priority>,
    pub hotel_unit: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub ia_lock: Option<IaLockChange>,
}

/// Partial message update. `metadata` replaces the stored document.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub status: Option<MessageStatus>,
    pub external_message_id: Option<String>,
    pub metadata: Option<Value>,
}

/// One entry of a conversation transcript imported with an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// `user` entries become inbound messages, anything else outbound.
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct EscalationRequest {
    pub tenant_id: String,
    pub contact_phone_number: String,
    pub contact_name: Option<String>,
    pub reason: EscalationReason,
    pub reason_detail: Option<String>,
    pub hotel_unit: Option<String>,
    pub priority: Priority,
    pub ai_context: Option<Value>,
    pub message_history: Vec<HistoryEntry>,
}

/// Everything created or touched by one escalation.
#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub contact: Contact,
    pub conversation: Conversation,
    pub conversation_created: bool,
    pub escalation: Escalation,
    pub imported_messages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_reason: BTreeMap<String, u64>,
    pub by_hotel_unit: BTreeMap<String, u64>,
}

// --- Channel gateway payloads ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMedia {
    pub kind: MediaKind,
    pub url: String,
    pub caption: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMessage {
    pub name: String,
    pub language_code: String,
    pub parameters: Vec<String>,
}

/// Provider acknowledgement of an accepted outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub external_message_id: String,
}

#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Where a downloaded media file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub local_path: String,
    pub public_url: String,
    pub file_size: u64,
}

/// Inbound message as handed to the automated agent.
///
/// `kind` selects which content section is present in `content`, e.g.
/// `text`, `image`, `location` or `buttonReply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub tenant_id: String,
    /// Phone number on WhatsApp, page-scoped sender id elsewhere.
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub content: serde_json::Map<String, Value>,
    pub message_id: String,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    pub conversation_id: String,
    pub is_new_conversation: bool,
    pub channel: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_wire_names() {
        assert_eq!(Channel::WhatsApp.to_string(), "WHATSAPP");
        assert_eq!(Channel::from_str("INSTAGRAM").unwrap(), Channel::Instagram);
        assert_eq!(serde_json::to_string(&Channel::WhatsApp).unwrap(), "\"WHATSAPP\"");
        assert_eq!(Channel::Messenger.key(), "messenger");
        assert_eq!(Channel::default(), Channel::WhatsApp);
    }

    #[test]
    fn agent_message_flattens_content_section() {
        let mut content = serde_json::Map::new();
        content.insert("text".into(), serde_json::json!({"message": "Oi"}));
        let message = AgentMessage {
            tenant_id: "t1".into(),
            phone: "5511999990000".into(),
            kind: "text".into(),
            content,
            message_id: "m1".into(),
            timestamp: 1_767_268_800,
            contact_name: None,
            conversation_id: "c1".into(),
            is_new_conversation: true,
            channel: "whatsapp".into(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["text"]["message"], "Oi");
        assert_eq!(json["type"], "text");
        assert_eq!(json["isNewConversation"], true);
        assert!(json.get("contactName").is_none());
    }

    #[test]
    fn conversation_status_wire_names() {
        assert_eq!(ConversationStatus::BotHandling.to_string(), "BOT_HANDLING");
        assert_eq!(ConversationStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(
            ConversationStatus::from_str("WAITING").unwrap(),
            ConversationStatus::Waiting
        );
        let json = serde_json::to_string(&ConversationStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn active_set_excludes_finished_states() {
        for status in ConversationStatus::ACTIVE {
            assert!(status.is_active());
            assert!(!status.is_finished());
        }
        assert!(!ConversationStatus::Closed.is_active());
        assert!(ConversationStatus::Archived.is_finished());
    }

    #[test]
    fn lock_owner_parses_reserved_values() {
        assert_eq!(LockOwner::parse("system"), LockOwner::System);
        assert_eq!(LockOwner::parse("system:followup"), LockOwner::Followup);
        assert_eq!(
            LockOwner::parse("user-7"),
            LockOwner::User("user-7".to_string())
        );
        assert_eq!(LockOwner::Followup.to_string(), LOCKED_BY_FOLLOWUP);
    }

    #[test]
    fn unlocked_conversation_has_no_owner() {
        let now = Utc::now();
        let mut conv = Conversation {
            id: "c1".into(),
            tenant_id: "t1".into(),
            contact_id: "k1".into(),
            status: ConversationStatus::Open,
            priority: Priority::Medium,
            assigned_to_id: None,
            hotel_unit: None,
            ia_locked: false,
            ia_locked_at: None,
            ia_locked_by: Some("system".into()),
            last_message_at: now,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(conv.lock_owner(), None);
        conv.ia_locked = true;
        assert_eq!(conv.lock_owner(), Some(LockOwner::System));
    }

    #[test]
    fn message_serializes_type_field_and_iso_timestamps() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let msg = Message {
            id: "m1".into(),
            tenant_id: "t1".into(),
            conversation_id: "c1".into(),
            external_message_id: Some("wamid.1".into()),
            direction: Direction::Inbound,
            message_type: MessageType::Text,
            content: "Olá".into(),
            metadata: Value::Null,
            status: MessageStatus::Delivered,
            timestamp: ts,
            created_at: ts,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "TEXT");
        assert_eq!(json["externalMessageId"], "wamid.1");
        assert_eq!(json["timestamp"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn media_kind_is_lowercase() {
        assert_eq!(MediaKind::Document.to_string(), "document");
        assert_eq!(MediaKind::from_str("sticker").unwrap(), MediaKind::Sticker);
    }
}
