// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery receipts for outbound messages.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use hostdesk_bus::RealtimeEvent;
use hostdesk_core::types::{ConversationPatch, Message, MessagePatch, MessageStatus};
use hostdesk_core::{HostdeskError, Job};
use hostdesk_queue::Processor;

use crate::context::PipelineContext;
use crate::payloads::StatusUpdateJob;
use crate::state::{self, ProviderStatus};
use crate::webhook::StatusEvent;

const DEFAULT_FAILURE_MESSAGE: &str = "Falha na entrega";

pub struct StatusProcessor {
    ctx: PipelineContext,
}

impl StatusProcessor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, job: StatusUpdateJob) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let event = &job.status;

        let Some(message) = self
            .ctx
            .store
            .find_message_by_external_id(tenant_id, &event.id)
            .await?
        else {
            match self.ctx.store.message_owner(&event.id).await? {
                Some(owner) if owner != tenant_id => error!(
                    tenant_id,
                    owner_tenant_id = %owner,
                    external_message_id = %event.id,
                    "status update addressed to a message of another tenant, dropped"
                ),
                _ => info!(
                    tenant_id,
                    external_message_id = %event.id,
                    status = %event.status,
                    "status update for unknown message, dropped"
                ),
            }
            return Ok(());
        };

        let provider = ProviderStatus::parse(&event.status);
        if provider == ProviderStatus::Unknown {
            warn!(tenant_id, raw_status = %event.status, message_id = %message.id, "unknown provider status, treating as SENT");
        }
        let next = provider.status();

        if message.status == next {
            debug!(tenant_id, message_id = %message.id, status = %next, "status unchanged");
            return Ok(());
        }
        if !state::is_expected_transition(message.status, next) {
            warn!(
                tenant_id,
                message_id = %message.id,
                from = %message.status,
                to = %next,
                "out-of-order status update applied"
            );
        }

        let metadata = merge_status_metadata(&message, event, next);
        let updated = self
            .ctx
            .store
            .update_message(
                tenant_id,
                &message.id,
                MessagePatch {
                    status: Some(next),
                    metadata: Some(metadata),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id, message_id = %updated.id, status = %next, "message status updated");

        self.ctx.publish(RealtimeEvent::MessageStatusUpdate {
            tenant_id: tenant_id.to_string(),
            conversation_id: updated.conversation_id.clone(),
            message_id: updated.id.clone(),
            status: next,
        });

        if next == MessageStatus::Read {
            self.on_read(tenant_id, &updated.conversation_id).await?;
        }
        Ok(())
    }

    async fn on_read(&self, tenant_id: &str, conversation_id: &str) -> Result<(), HostdeskError> {
        let conversation = self.ctx.store.get_conversation(tenant_id, conversation_id).await?;
        let Some(status) = state::on_outbound_read(conversation.status) else {
            return Ok(());
        };
        let updated = self
            .ctx
            .store
            .update_conversation(
                tenant_id,
                conversation_id,
                ConversationPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        debug!(tenant_id, conversation_id, status = %status, "conversation waiting on customer");
        self.ctx.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: tenant_id.to_string(),
            conversation_id: updated.id.clone(),
            hotel_unit: updated.hotel_unit.clone(),
            updates: json!({ "status": updated.status }),
        });
        Ok(())
    }
}

/// Provider receipt as kept in `metadata.statusUpdates`.
fn status_entry(event: &StatusEvent) -> Value {
    let mut entry = Map::new();
    entry.insert("whatsappStatus".into(), json!(event.status));
    entry.insert("timestamp".into(), json!(event.timestamp));
    entry.insert("recipientId".into(), json!(event.recipient_id));

    if !event.errors.is_empty() {
        let errors: Vec<Value> = event
            .errors
            .iter()
            .map(|e| {
                json!({
                    "code": e.code,
                    "title": e.title,
                    "message": e.message,
                    "details": e.error_data.as_ref().and_then(|d| d.details.clone()),
                })
            })
            .collect();
        entry.insert("errors".into(), Value::Array(errors));
    }
    if let Some(conversation) = &event.conversation {
        entry.insert(
            "conversation".into(),
            json!({
                "id": conversation.id,
                "originType": conversation.origin.as_ref().and_then(|o| o.kind.clone()),
                "expirationTimestamp": conversation.expiration_timestamp,
            }),
        );
    }
    if let Some(pricing) = &event.pricing {
        entry.insert(
            "pricing".into(),
            json!({
                "billable": pricing.billable,
                "pricingModel": pricing.pricing_model,
                "category": pricing.category,
            }),
        );
    }
    Value::Object(entry)
}

/// Appends the receipt to the history and, on failure, records the first
/// provider error under `delivery.error`.
fn merge_status_metadata(message: &Message, event: &StatusEvent, next: MessageStatus) -> Value {
    let mut metadata = match &message.metadata {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let history = metadata
        .entry("statusUpdates")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !history.is_array() {
        *history = Value::Array(Vec::new());
    }
    if let Value::Array(items) = history {
        items.push(status_entry(event));
    }

    if next == MessageStatus::Failed
        && let Some(first) = event.errors.first()
    {
        let message_text = first
            .message
            .clone()
            .or_else(|| first.title.clone())
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
        let mut delivery = match metadata.remove("delivery") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        delivery.insert(
            "error".into(),
            json!({
                "code": first.code.map(|c| c.to_string()),
                "message": message_text,
                "details": first.error_data.as_ref().and_then(|d| d.details.clone()),
            }),
        );
        metadata.insert("delivery".into(), Value::Object(delivery));
    }

    Value::Object(metadata)
}

#[async_trait]
impl Processor for StatusProcessor {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError> {
        self.handle(job.decode()?).await
    }
}
