// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time events and the rooms they are routed to.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use hostdesk_core::types::{Contact, Conversation, Escalation, Message, MessageStatus};

pub const CONVERSATION_NEW: &str = "conversation:new";
pub const CONVERSATION_UPDATED: &str = "conversation:updated";
pub const MESSAGE_NEW: &str = "message:new";
pub const MESSAGE_STATUS_UPDATE: &str = "message:status-update";
pub const ESCALATION_NEW: &str = "escalation:new";

/// A subscription target for connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Conversation(String),
    TenantAdmins(String),
    HotelUnit { tenant_id: String, unit: String },
}

impl Room {
    /// Parses the wire form produced by [`Room`]'s `Display`.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(id) = raw.strip_prefix("conversation:") {
            return (!id.is_empty()).then(|| Self::Conversation(id.to_string()));
        }
        let rest = raw.strip_prefix("tenant:")?;
        if let Some(tenant) = rest.strip_suffix(":admins") {
            return (!tenant.is_empty()).then(|| Self::TenantAdmins(tenant.to_string()));
        }
        let (tenant, unit) = rest.split_once(":unit:")?;
        if tenant.is_empty() || unit.is_empty() {
            return None;
        }
        Some(Self::HotelUnit {
            tenant_id: tenant.to_string(),
            unit: unit.to_string(),
        })
    }

    /// Tenant owning a tenant-scoped room. Conversation rooms carry none.
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Self::Conversation(_) => None,
            Self::TenantAdmins(t) | Self::HotelUnit { tenant_id: t, .. } => Some(t),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation(id) => write!(f, "conversation:{id}"),
            Self::TenantAdmins(t) => write!(f, "tenant:{t}:admins"),
            Self::HotelUnit { tenant_id, unit } => write!(f, "tenant:{tenant_id}:unit:{unit}"),
        }
    }
}

/// One delivery: an event name and payload addressed to a single room.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub room: String,
    pub event: &'static str,
    pub data: Arc<Value>,
}

/// Events published by the pipeline.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    ConversationNew {
        conversation: Conversation,
        escalation: Option<Escalation>,
    },
    ConversationUpdated {
        tenant_id: String,
        conversation_id: String,
        hotel_unit: Option<String>,
        updates: Value,
    },
    MessageNew {
        message: Message,
        conversation: Conversation,
    },
    MessageStatusUpdate {
        tenant_id: String,
        conversation_id: String,
        message_id: String,
        status: MessageStatus,
    },
    EscalationNew {
        escalation: Escalation,
        conversation: Conversation,
        contact: Contact,
    },
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn tenant_rooms(tenant_id: &str, hotel_unit: Option<&str>) -> Vec<Room> {
    let mut rooms = vec![Room::TenantAdmins(tenant_id.to_string())];
    if let Some(unit) = hotel_unit.filter(|u| !u.is_empty()) {
        rooms.push(Room::HotelUnit {
            tenant_id: tenant_id.to_string(),
            unit: unit.to_string(),
        });
    }
    rooms
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConversationNew { .. } => CONVERSATION_NEW,
            Self::ConversationUpdated { .. } => CONVERSATION_UPDATED,
            Self::MessageNew { .. } => MESSAGE_NEW,
            Self::MessageStatusUpdate { .. } => MESSAGE_STATUS_UPDATE,
            Self::EscalationNew { .. } => ESCALATION_NEW,
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            Self::ConversationNew { conversation, .. } => &conversation.tenant_id,
            Self::ConversationUpdated { tenant_id, .. } => tenant_id,
            Self::MessageNew { message, .. } => &message.tenant_id,
            Self::MessageStatusUpdate { tenant_id, .. } => tenant_id,
            Self::EscalationNew { escalation, .. } => &escalation.tenant_id,
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            Self::ConversationNew { conversation, .. } => &conversation.id,
            Self::ConversationUpdated { conversation_id, .. } => conversation_id,
            Self::MessageNew { message, .. } => &message.conversation_id,
            Self::MessageStatusUpdate { conversation_id, .. } => conversation_id,
            Self::EscalationNew { escalation, .. } => &escalation.conversation_id,
        }
    }

    /// Expands the event into per-room deliveries.
    ///
    /// A new message also refreshes the conversation lists of admins and of
    /// the conversation's hotel unit with a `conversation:updated` carrying
    /// the last message.
    pub fn envelopes(&self) -> Vec<Envelope> {
        let tenant_id = self.tenant_id();
        let conversation_room = Room::Conversation(self.conversation_id().to_string());
        let mut out = Vec::new();
        let mut push = |rooms: Vec<Room>, event: &'static str, data: Arc<Value>| {
            for room in rooms {
                out.push(Envelope {
                    room: room.to_string(),
                    event,
                    data: Arc::clone(&data),
                });
            }
        };

        match self {
            Self::MessageNew {
                message,
                conversation,
            } => {
                let message_json = to_value(message);
                let conversation_json = to_value(conversation);
                let unit = conversation.hotel_unit.as_deref();

                let mut rooms = vec![conversation_room];
                rooms.extend(tenant_rooms(tenant_id, unit));
                push(
                    rooms,
                    MESSAGE_NEW,
                    Arc::new(json!({
                        "message": message_json,
                        "conversation": conversation_json,
                        "conversationId": conversation.id,
                    })),
                );
                push(
                    tenant_rooms(tenant_id, unit),
                    CONVERSATION_UPDATED,
                    Arc::new(json!({
                        "conversationId": conversation.id,
                        "conversation": conversation_json,
                        "lastMessage": message_json,
                        "lastMessageAt": message_json.get("timestamp").cloned().unwrap_or(Value::Null),
                    })),
                );
            }
            Self::MessageStatusUpdate {
                conversation_id,
                message_id,
                status,
                ..
            } => push(
                vec![conversation_room],
                MESSAGE_STATUS_UPDATE,
                Arc::new(json!({
                    "conversationId": conversation_id,
                    "messageId": message_id,
                    "status": status,
                })),
            ),
            Self::ConversationNew {
                conversation,
                escalation,
            } => {
                let mut data = json!({ "conversation": to_value(conversation) });
                if let Some(escalation) = escalation {
                    data["escalation"] = to_value(escalation);
                }
                push(
                    tenant_rooms(tenant_id, conversation.hotel_unit.as_deref()),
                    CONVERSATION_NEW,
                    Arc::new(data),
                );
            }
            Self::ConversationUpdated {
                conversation_id,
                hotel_unit,
                updates,
                ..
            } => {
                let mut rooms = tenant_rooms(tenant_id, hotel_unit.as_deref());
                rooms.push(conversation_room);
                push(
                    rooms,
                    CONVERSATION_UPDATED,
                    Arc::new(json!({
                        "conversationId": conversation_id,
                        "updates": updates,
                    })),
                );
            }
            Self::EscalationNew {
                escalation,
                conversation,
                contact,
            } => push(
                tenant_rooms(tenant_id, escalation.hotel_unit.as_deref()),
                ESCALATION_NEW,
                Arc::new(json!({
                    "escalation": to_value(escalation),
                    "conversation": to_value(conversation),
                    "contact": to_value(contact),
                })),
            ),
        }
        out
    }
}
