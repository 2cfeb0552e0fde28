// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attendant messages: persisted as `PENDING`, then sent by the outgoing
//! worker.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use hostdesk_bus::RealtimeEvent;
use hostdesk_core::types::{
    Conversation, ConversationPatch, ConversationStatus, Direction, InsertOutcome, MediaKind,
    Message, MessagePatch, MessageStatus, MessageType, NewMessage, OutboundMedia, SendReceipt,
    TemplateMessage,
};
use hostdesk_core::{HostdeskError, Job};
use hostdesk_queue::{Processor, QueueName};

use crate::context::PipelineContext;
use crate::payloads::OutgoingMessageJob;
use crate::processors::{MESSAGES_TOTAL, SENDS_TOTAL};
use crate::state;

const DEFAULT_TEMPLATE_LANGUAGE: &str = "pt_BR";

/// A message an attendant wants delivered to the customer.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub tenant_id: String,
    pub conversation_id: String,
    /// Customer phone number.
    pub to: String,
    pub message_type: MessageType,
    pub content: String,
    /// `url`, `caption` and `filename` for media; `templateName`,
    /// `languageCode` and `parameters` for templates.
    pub metadata: Value,
}

fn send_type(message_type: MessageType) -> Result<&'static str, HostdeskError> {
    match message_type {
        MessageType::Text => Ok("text"),
        MessageType::Image => Ok("image"),
        MessageType::Video => Ok("video"),
        MessageType::Audio => Ok("audio"),
        MessageType::Document => Ok("document"),
        MessageType::Template => Ok("template"),
        other => Err(HostdeskError::BadRequest(format!(
            "message type {other} cannot be sent"
        ))),
    }
}

/// Persists the message as `PENDING` and queues it for sending.
pub async fn queue_outbound(
    ctx: &PipelineContext,
    request: OutboundRequest,
) -> Result<Message, HostdeskError> {
    let kind = send_type(request.message_type)?;
    let conversation = ctx
        .store
        .get_conversation(&request.tenant_id, &request.conversation_id)
        .await?;
    let metadata = match request.metadata {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(Map::new()),
        _ => return Err(HostdeskError::BadRequest("metadata must be an object".into())),
    };

    let outcome = ctx
        .store
        .insert_message(NewMessage {
            tenant_id: request.tenant_id.clone(),
            conversation_id: conversation.id.clone(),
            external_message_id: None,
            direction: Direction::Outbound,
            message_type: request.message_type,
            content: request.content.clone(),
            metadata: metadata.clone(),
            status: MessageStatus::Pending,
            timestamp: Utc::now(),
        })
        .await?;
    let message = match outcome {
        InsertOutcome::Inserted(message) | InsertOutcome::Duplicate(message) => message,
    };

    let job = OutgoingMessageJob {
        tenant_id: request.tenant_id,
        conversation_id: conversation.id,
        message_id: message.id.clone(),
        to: request.to,
        message_type: kind.to_string(),
        content: request.content,
        metadata: Some(metadata),
    };
    let options = ctx
        .jobs
        .options(QueueName::Outgoing)
        .with_dedup_key(job.dedup_key());
    ctx.jobs.enqueue(QueueName::Outgoing, &job, options).await?;
    info!(tenant_id = %job.tenant_id, message_id = %message.id, kind, "outbound message queued");
    Ok(message)
}

pub struct OutgoingProcessor {
    ctx: PipelineContext,
}

impl OutgoingProcessor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Sends one queued message. `attempts` is the attempt number being run,
    /// recorded with the failure.
    pub async fn handle(&self, job: OutgoingMessageJob, attempts: u32) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let message = self.ctx.store.get_message(tenant_id, &job.message_id).await?;
        if let Some(external_id) = &message.external_message_id {
            warn!(tenant_id, message_id = %message.id, external_message_id = %external_id, "message already sent, skipping");
            return Ok(());
        }

        match self.send(&job).await {
            Ok(receipt) => self.on_sent(&job, receipt).await,
            Err(e) => {
                error!(
                    tenant_id,
                    message_id = %message.id,
                    conversation_id = %job.conversation_id,
                    attempts,
                    error = %e,
                    "outbound send failed"
                );
                metrics::counter!(SENDS_TOTAL, "outcome" => "failed").increment(1);
                self.on_failed(&message, &e, attempts).await?;
                Err(e)
            }
        }
    }

    async fn send(&self, job: &OutgoingMessageJob) -> Result<SendReceipt, HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let metadata = job.metadata.as_ref().unwrap_or(&Value::Null);
        let field = |name: &str| metadata.get(name).and_then(Value::as_str).map(str::to_string);

        match job.message_type.as_str() {
            "text" => self.ctx.gateway.send_text(tenant_id, &job.to, &job.content).await,
            "image" | "video" | "audio" | "document" => {
                let kind: MediaKind = job
                    .message_type
                    .parse()
                    .map_err(|_| HostdeskError::BadRequest(format!("unknown media type {}", job.message_type)))?;
                let url = field("url").ok_or_else(|| {
                    HostdeskError::BadRequest(format!("media url required for type {}", job.message_type))
                })?;
                let media = OutboundMedia {
                    kind,
                    url,
                    caption: field("caption"),
                    filename: field("filename"),
                };
                self.ctx.gateway.send_media(tenant_id, &job.to, &media).await
            }
            "template" => {
                let name = field("templateName").ok_or_else(|| {
                    HostdeskError::BadRequest("template name required for template messages".into())
                })?;
                let parameters = metadata
                    .get("parameters")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .map(|v| match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let template = TemplateMessage {
                    name,
                    language_code: field("languageCode")
                        .unwrap_or_else(|| DEFAULT_TEMPLATE_LANGUAGE.to_string()),
                    parameters,
                };
                self.ctx.gateway.send_template(tenant_id, &job.to, &template).await
            }
            other => Err(HostdeskError::BadRequest(format!("unsupported message type: {other}"))),
        }
    }

    async fn on_sent(&self, job: &OutgoingMessageJob, receipt: SendReceipt) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let message = self
            .ctx
            .store
            .update_message(
                tenant_id,
                &job.message_id,
                MessagePatch {
                    status: Some(MessageStatus::Sent),
                    external_message_id: Some(receipt.external_message_id.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let current = self.ctx.store.get_conversation(tenant_id, &job.conversation_id).await?;
        let status = self.sent_status(&current).await?;
        let sent_at = Utc::now();
        let patch = |status| ConversationPatch {
            status,
            last_message_at: Some(sent_at),
            ..Default::default()
        };
        let conversation = match self
            .ctx
            .store
            .update_conversation(tenant_id, &current.id, patch(status))
            .await
        {
            Ok(conversation) => conversation,
            // Another conversation became active in between; the message is
            // already out, so record it without moving the status.
            Err(e @ HostdeskError::Storage { .. }) if status.is_some() => {
                warn!(tenant_id, conversation_id = %current.id, error = %e, "status change rejected, keeping status");
                self.ctx
                    .store
                    .update_conversation(tenant_id, &current.id, patch(None))
                    .await?
            }
            Err(e) => return Err(e),
        };

        metrics::counter!(SENDS_TOTAL, "outcome" => "sent").increment(1);
        metrics::counter!(
            MESSAGES_TOTAL,
            "direction" => "outbound",
            "type" => message.message_type.to_string()
        )
        .increment(1);
        info!(
            tenant_id,
            conversation_id = %conversation.id,
            message_id = %message.id,
            external_message_id = %receipt.external_message_id,
            "outbound message sent"
        );
        self.ctx.publish(RealtimeEvent::MessageNew { message, conversation });
        Ok(())
    }

    /// Status after a send. A closed or archived conversation is only
    /// brought back when its contact has no other active conversation.
    async fn sent_status(&self, current: &Conversation) -> Result<Option<ConversationStatus>, HostdeskError> {
        let next = state::on_outbound_sent(current.status);
        if next.is_none() || current.status.is_active() {
            return Ok(next);
        }
        match self
            .ctx
            .store
            .find_active_conversation(&current.tenant_id, &current.contact_id)
            .await?
        {
            Some(active) if active.id != current.id => {
                info!(
                    tenant_id = %current.tenant_id,
                    conversation_id = %current.id,
                    active_conversation_id = %active.id,
                    status = %current.status,
                    "contact has another active conversation, status unchanged"
                );
                Ok(None)
            }
            _ => Ok(next),
        }
    }

    async fn on_failed(
        &self,
        message: &Message,
        cause: &HostdeskError,
        attempts: u32,
    ) -> Result<(), HostdeskError> {
        let mut metadata = match &message.metadata {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        metadata.insert(
            "error".into(),
            json!({
                "message": cause.to_string(),
                "timestamp": Utc::now(),
                "attemptsMade": attempts,
            }),
        );
        let updated = self
            .ctx
            .store
            .update_message(
                &message.tenant_id,
                &message.id,
                MessagePatch {
                    status: Some(MessageStatus::Failed),
                    metadata: Some(Value::Object(metadata)),
                    ..Default::default()
                },
            )
            .await?;
        self.ctx.publish(RealtimeEvent::MessageStatusUpdate {
            tenant_id: updated.tenant_id.clone(),
            conversation_id: updated.conversation_id.clone(),
            message_id: updated.id.clone(),
            status: MessageStatus::Failed,
        });
        Ok(())
    }
}

#[async_trait]
impl Processor for OutgoingProcessor {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError> {
        self.handle(job.decode()?, job.attempts).await
    }
}
