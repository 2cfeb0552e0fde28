// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound customer messages: contact, conversation, message row, then the
//! side effects (unit selection, human request, flow replies, media, events).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use hostdesk_bus::RealtimeEvent;
use hostdesk_core::types::{
    Channel, Contact, Conversation, ConversationPatch, ConversationStatus, Direction, IaLockChange,
    InsertOutcome, LockOwner, Message, MessageStatus, NewMessage,
};
use hostdesk_core::{HostdeskError, Job};
use hostdesk_queue::{Processor, QueueName};

use crate::agent::{AgentEnvelope, agent_message};
use crate::classify::{Classified, MediaRef, classify};
use crate::context::PipelineContext;
use crate::detect::{HotelUnitMatcher, HumanRequestDetector};
use crate::payloads::{IncomingMessageJob, MediaDownloadJob};
use crate::processors::MESSAGES_TOTAL;
use crate::state;

pub struct IncomingProcessor {
    ctx: PipelineContext,
    human: HumanRequestDetector,
    units: HotelUnitMatcher,
}

impl IncomingProcessor {
    pub fn new(ctx: PipelineContext) -> Self {
        let human = HumanRequestDetector::new(&ctx.config.escalation.human_request_keywords);
        let units = HotelUnitMatcher::from_config(&ctx.config.escalation);
        Self { ctx, human, units }
    }

    pub async fn handle(&self, job: IncomingMessageJob) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let message = &job.message;

        let contact = self
            .ctx
            .store
            .find_or_create_contact(tenant_id, &message.from, job.contact_name.as_deref())
            .await?;
        self.refresh_profile_picture(&contact).await;

        let (mut conversation, created) = self
            .ctx
            .store
            .find_or_create_active_conversation(tenant_id, &contact.id)
            .await?;
        if created {
            info!(tenant_id, conversation_id = %conversation.id, contact_id = %contact.id, "conversation opened");
            self.ctx.publish(RealtimeEvent::ConversationNew {
                conversation: conversation.clone(),
                escalation: None,
            });
        }

        let classified = classify(message);
        let timestamp = message
            .timestamp_millis()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        let stored = match self
            .ctx
            .store
            .insert_message(NewMessage {
                tenant_id: tenant_id.to_string(),
                conversation_id: conversation.id.clone(),
                external_message_id: Some(message.id.clone()),
                direction: Direction::Inbound,
                message_type: classified.message_type,
                content: classified.content.clone(),
                metadata: classified.metadata.clone(),
                status: MessageStatus::Delivered,
                timestamp,
            })
            .await?
        {
            InsertOutcome::Inserted(stored) => stored,
            InsertOutcome::Duplicate(existing) => {
                info!(
                    tenant_id,
                    external_message_id = %message.id,
                    message_id = %existing.id,
                    "duplicate inbound message, resuming follow-up steps"
                );
                return self.resume_duplicate(existing, &classified).await;
            }
        };
        metrics::counter!(
            MESSAGES_TOTAL,
            "direction" => "inbound",
            "type" => stored.message_type.to_string()
        )
        .increment(1);

        conversation = self
            .ctx
            .store
            .update_conversation(
                tenant_id,
                &conversation.id,
                ConversationPatch {
                    status: state::on_inbound(conversation.status),
                    last_message_at: Some(stored.timestamp),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(unit) = self.units.detect(message)
            && conversation.hotel_unit.as_deref() != Some(unit)
        {
            conversation = self.assign_hotel_unit(&conversation, unit).await?;
        }

        if !conversation.ia_locked && self.human.detect(message) {
            conversation = self.lock_for_human(&conversation).await?;
        }

        self.route_flow_reply(tenant_id, &conversation, &classified).await;

        if let Some(media) = &classified.media {
            self.queue_download(&stored, media).await?;
        }

        self.ctx.gateway.mark_read(tenant_id, &message.id).await;

        let forward = agent_message(
            &stored,
            &conversation,
            AgentEnvelope {
                sender: &message.from,
                contact_name: contact.name.as_deref().or(job.contact_name.as_deref()),
                is_new_conversation: created,
                channel: Channel::WhatsApp,
            },
        );
        self.ctx.forward_to_agent(&conversation, forward);

        info!(
            tenant_id,
            conversation_id = %conversation.id,
            message_id = %stored.id,
            message_type = %stored.message_type,
            "inbound message stored"
        );
        self.ctx.publish(RealtimeEvent::MessageNew {
            message: stored,
            conversation,
        });
        Ok(())
    }

    /// Replays the steps that may not have run when an earlier attempt
    /// failed after the row was written. Each step is safe to repeat: the
    /// timestamp only moves forward, the download is deduplicated and
    /// skipped once the file is linked, and `message:new` is keyed by the
    /// message id on the client.
    async fn resume_duplicate(
        &self,
        existing: Message,
        classified: &Classified,
    ) -> Result<(), HostdeskError> {
        let tenant_id = existing.tenant_id.as_str();
        let mut conversation = self
            .ctx
            .store
            .get_conversation(tenant_id, &existing.conversation_id)
            .await?;
        if conversation.last_message_at < existing.timestamp {
            conversation = self
                .ctx
                .store
                .update_conversation(
                    tenant_id,
                    &conversation.id,
                    ConversationPatch {
                        last_message_at: Some(existing.timestamp),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let downloaded = existing.metadata.get("localPath").is_some()
            || existing.metadata.get("mediaUrl").is_some();
        if let Some(media) = &classified.media
            && !downloaded
        {
            self.queue_download(&existing, media).await?;
        }

        if let Some(external_id) = &existing.external_message_id {
            self.ctx.gateway.mark_read(tenant_id, external_id).await;
        }
        self.ctx.publish(RealtimeEvent::MessageNew {
            message: existing,
            conversation,
        });
        Ok(())
    }

    async fn queue_download(&self, message: &Message, media: &MediaRef) -> Result<(), HostdeskError> {
        let download = MediaDownloadJob {
            tenant_id: message.tenant_id.clone(),
            message_id: message.id.clone(),
            media_id: media.media_id.clone(),
            media_type: media.kind.to_string(),
            mime_type: media.mime_type.clone(),
        };
        let options = self
            .ctx
            .jobs
            .options(QueueName::Media)
            .with_dedup_key(download.dedup_key());
        self.ctx.jobs.enqueue(QueueName::Media, &download, options).await?;
        debug!(tenant_id = %message.tenant_id, message_id = %message.id, media_id = %media.media_id, "media download queued");
        Ok(())
    }

    /// Best-effort: a missing picture never fails the message.
    async fn refresh_profile_picture(&self, contact: &Contact) {
        let Some(phone) = contact.phone_number.as_deref() else {
            return;
        };
        if contact.profile_picture_url.is_some() {
            return;
        }
        match self
            .ctx
            .gateway
            .get_profile_picture(&contact.tenant_id, phone)
            .await
        {
            Ok(Some(url)) => {
                if let Err(e) = self
                    .ctx
                    .store
                    .update_contact_profile_picture(&contact.tenant_id, &contact.id, &url)
                    .await
                {
                    warn!(contact_id = %contact.id, error = %e, "failed to store profile picture");
                }
            }
            Ok(None) => {}
            Err(e) => debug!(contact_id = %contact.id, error = %e, "profile picture unavailable"),
        }
    }

    async fn assign_hotel_unit(
        &self,
        conversation: &Conversation,
        unit: &str,
    ) -> Result<Conversation, HostdeskError> {
        let updated = self
            .ctx
            .store
            .update_conversation(
                &conversation.tenant_id,
                &conversation.id,
                ConversationPatch {
                    hotel_unit: Some(unit.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id = %updated.tenant_id, conversation_id = %updated.id, unit, "hotel unit selected");

        // Attendants of the unit have not seen this conversation yet.
        self.ctx.publish(RealtimeEvent::ConversationNew {
            conversation: updated.clone(),
            escalation: None,
        });
        self.ctx.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: updated.tenant_id.clone(),
            conversation_id: updated.id.clone(),
            hotel_unit: updated.hotel_unit.clone(),
            updates: json!({ "hotelUnit": unit }),
        });
        Ok(updated)
    }

    async fn lock_for_human(&self, conversation: &Conversation) -> Result<Conversation, HostdeskError> {
        let updated = self
            .ctx
            .store
            .update_conversation(
                &conversation.tenant_id,
                &conversation.id,
                ConversationPatch {
                    status: Some(ConversationStatus::Open),
                    ia_lock: Some(IaLockChange::Lock {
                        by: LockOwner::System,
                        at: Utc::now(),
                    }),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id = %updated.tenant_id, conversation_id = %updated.id, "customer asked for a human, IA locked");
        self.ctx.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: updated.tenant_id.clone(),
            conversation_id: updated.id.clone(),
            hotel_unit: updated.hotel_unit.clone(),
            updates: json!({
                "iaLocked": updated.ia_locked,
                "iaLockedAt": updated.ia_locked_at,
                "iaLockedBy": updated.ia_locked_by,
                "status": updated.status,
            }),
        });
        Ok(updated)
    }

    /// A booking flow answered from another conversation moves that
    /// conversation to `IN_PROGRESS`. Failures are logged and ignored.
    async fn route_flow_reply(&self, tenant_id: &str, current: &Conversation, classified: &Classified) {
        let Some(target_id) = classified
            .metadata
            .pointer("/nfmReply/conversationId")
            .and_then(Value::as_str)
        else {
            return;
        };
        if target_id == current.id {
            return;
        }

        let now = Utc::now();
        match self
            .ctx
            .store
            .update_conversation(
                tenant_id,
                target_id,
                ConversationPatch {
                    status: Some(ConversationStatus::InProgress),
                    last_message_at: Some(now),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(target) => {
                info!(tenant_id, conversation_id = %target.id, "flow reply routed to originating conversation");
                self.ctx.publish(RealtimeEvent::ConversationUpdated {
                    tenant_id: tenant_id.to_string(),
                    conversation_id: target.id.clone(),
                    hotel_unit: target.hotel_unit.clone(),
                    updates: json!({
                        "status": target.status,
                        "lastMessageAt": target.last_message_at,
                    }),
                });
            }
            Err(e) => warn!(tenant_id, conversation_id = target_id, error = %e, "failed to route flow reply"),
        }
    }
}

#[async_trait]
impl Processor for IncomingProcessor {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError> {
        self.handle(job.decode()?).await
    }
}
