// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared services handed to every processor.

use std::sync::Arc;

use tracing::{debug, warn};

use hostdesk_bus::{EventSink, RealtimeEvent};
use hostdesk_config::HostdeskConfig;
use hostdesk_core::types::Conversation;
use hostdesk_core::{AgentForwarder, AgentMessage, ChannelGateway, MediaStorage, StorageAdapter};
use hostdesk_queue::JobQueue;

/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<HostdeskConfig>,
    pub store: Arc<dyn StorageAdapter>,
    pub gateway: Arc<dyn ChannelGateway>,
    pub media: Arc<dyn MediaStorage>,
    pub events: Arc<dyn EventSink>,
    pub agent: Arc<dyn AgentForwarder>,
    pub jobs: JobQueue,
}

impl PipelineContext {
    pub fn publish(&self, event: RealtimeEvent) {
        self.events.publish(event);
    }

    /// Hands `message` to the agent on a background task. Skipped while
    /// the conversation is IA-locked; failures are logged, never retried.
    pub fn forward_to_agent(&self, conversation: &Conversation, message: AgentMessage) {
        if conversation.ia_locked {
            debug!(
                tenant_id = %conversation.tenant_id,
                conversation_id = %conversation.id,
                "conversation IA-locked, not forwarding to agent"
            );
            return;
        }
        let agent = self.agent.clone();
        tokio::spawn(async move {
            if let Err(e) = agent.forward(&message).await {
                warn!(
                    tenant_id = %message.tenant_id,
                    message_id = %message.message_id,
                    error = %e,
                    "failed to forward message to agent"
                );
            }
        });
    }
}
