// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger and Instagram customer messages.
//!
//! Page customers have no phone number: contacts are keyed by the
//! page-scoped sender id and new conversations start with the bot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::info;

use hostdesk_bus::RealtimeEvent;
use hostdesk_config::model::PageChannel;
use hostdesk_core::types::{
    Channel, ConversationPatch, ConversationStatus, Direction, InsertOutcome, MessageStatus,
    MessageType, NewMessage,
};
use hostdesk_core::{HostdeskError, Job};
use hostdesk_queue::Processor;

use crate::agent::{AgentEnvelope, agent_message};
use crate::context::PipelineContext;
use crate::payloads::PageMessageJob;
use crate::processors::MESSAGES_TOTAL;

pub struct PageProcessor {
    ctx: PipelineContext,
    channel: Channel,
}

impl PageProcessor {
    pub fn new(ctx: PipelineContext, channel: PageChannel) -> Self {
        let channel = match channel {
            PageChannel::Messenger => Channel::Messenger,
            PageChannel::Instagram => Channel::Instagram,
        };
        Self { ctx, channel }
    }

    pub async fn handle(&self, job: PageMessageJob) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let contact = self
            .ctx
            .store
            .find_or_create_external_contact(tenant_id, self.channel, &job.sender_id, None)
            .await?;

        let (conversation, created) = self
            .ctx
            .store
            .find_or_create_active_conversation_as(
                tenant_id,
                &contact.id,
                ConversationStatus::BotHandling,
            )
            .await?;
        if created {
            info!(tenant_id, channel = %self.channel, conversation_id = %conversation.id, "conversation opened");
            self.ctx.publish(RealtimeEvent::ConversationNew {
                conversation: conversation.clone(),
                escalation: None,
            });
        }

        let (message_type, content, metadata) = page_content(self.channel, &job);
        let timestamp = job
            .timestamp
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        let outcome = self
            .ctx
            .store
            .insert_message(NewMessage {
                tenant_id: tenant_id.to_string(),
                conversation_id: conversation.id.clone(),
                external_message_id: Some(job.message_id.clone()),
                direction: Direction::Inbound,
                message_type,
                content,
                metadata,
                status: MessageStatus::Delivered,
                timestamp,
            })
            .await?;
        let (stored, duplicate) = match outcome {
            InsertOutcome::Inserted(stored) => (stored, false),
            InsertOutcome::Duplicate(existing) => {
                info!(tenant_id, external_message_id = %job.message_id, "duplicate page message, re-announcing");
                (existing, true)
            }
        };
        if !duplicate {
            metrics::counter!(
                MESSAGES_TOTAL,
                "direction" => "inbound",
                "type" => stored.message_type.to_string()
            )
            .increment(1);
        }

        let mut conversation = self
            .ctx
            .store
            .get_conversation(tenant_id, &stored.conversation_id)
            .await?;
        if conversation.last_message_at < stored.timestamp {
            conversation = self
                .ctx
                .store
                .update_conversation(
                    tenant_id,
                    &conversation.id,
                    ConversationPatch {
                        last_message_at: Some(stored.timestamp),
                        ..Default::default()
                    },
                )
                .await?;
        }

        if !duplicate {
            let forward = agent_message(
                &stored,
                &conversation,
                AgentEnvelope {
                    sender: &job.sender_id,
                    contact_name: contact.name.as_deref(),
                    is_new_conversation: created,
                    channel: self.channel,
                },
            );
            self.ctx.forward_to_agent(&conversation, forward);
            info!(
                tenant_id,
                channel = %self.channel,
                conversation_id = %conversation.id,
                message_id = %stored.id,
                "page message stored"
            );
        }

        self.ctx.publish(RealtimeEvent::MessageNew {
            message: stored,
            conversation,
        });
        Ok(())
    }
}

/// Stored type, content and metadata of a page event. Postbacks and quick
/// replies carry the same `button` metadata as WhatsApp button replies.
fn page_content(channel: Channel, job: &PageMessageJob) -> (MessageType, String, Value) {
    let mut metadata = Map::new();
    metadata.insert("source".into(), json!(channel.key()));

    if let Some(postback) = &job.postback {
        let title = postback
            .title
            .clone()
            .or_else(|| postback.payload.clone())
            .unwrap_or_default();
        metadata.insert(
            "postback".into(),
            json!({"payload": postback.payload, "title": postback.title}),
        );
        metadata.insert("button".into(), json!({"id": postback.payload, "title": title}));
        return (MessageType::Text, title, Value::Object(metadata));
    }

    let Some(message) = &job.message else {
        return (MessageType::Text, String::new(), Value::Object(metadata));
    };

    if let Some(quick_reply) = &message.quick_reply {
        let content = message
            .text
            .clone()
            .unwrap_or_else(|| quick_reply.payload.clone());
        metadata.insert("quick_reply".into(), json!({"payload": quick_reply.payload}));
        metadata.insert(
            "button".into(),
            json!({"id": quick_reply.payload, "title": content}),
        );
        return (MessageType::Text, content, Value::Object(metadata));
    }

    if let Some(text) = &message.text {
        return (MessageType::Text, text.clone(), Value::Object(metadata));
    }

    let Some(attachment) = message.attachments.first() else {
        return (MessageType::Text, String::new(), Value::Object(metadata));
    };
    let message_type = match (attachment.kind.as_str(), channel) {
        ("image", _) => MessageType::Image,
        ("video", _) => MessageType::Video,
        ("audio", _) => MessageType::Audio,
        ("file", Channel::Messenger) => MessageType::Document,
        (_, Channel::Instagram) => MessageType::Image,
        _ => MessageType::Text,
    };
    let url = attachment.payload.as_ref().and_then(|p| p.url.clone());
    let content = url
        .clone()
        .unwrap_or_else(|| format!("[{}]", attachment.kind));
    if let Some(url) = url {
        metadata.insert("mediaUrl".into(), json!(url));
    }
    metadata.insert("mediaType".into(), json!(attachment.kind));
    (message_type, content, Value::Object(metadata))
}

#[async_trait]
impl Processor for PageProcessor {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError> {
        self.handle(job.decode()?).await
    }
}
