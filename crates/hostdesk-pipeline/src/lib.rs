// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message pipeline for the Hostdesk hotel CRM.
//!
//! The [`WebhookDispatcher`] turns provider webhooks into durable jobs. The
//! [`Pipeline`] runs one worker pool per queue:
//! - incoming messages create contacts, conversations and messages
//! - status receipts advance outbound message status
//! - outgoing messages are sent through the channel gateway
//! - media is downloaded into local storage
//! - follow-up locks are released when their window expires
//! - Messenger and Instagram page events become contacts and messages
//!
//! Stored customer messages are handed to the automation agent unless a
//! person holds the conversation's IA lock.
//!
//! The [`EscalationManager`] covers the attendant-facing operations.

pub mod agent;
pub mod classify;
pub mod context;
pub mod detect;
pub mod escalation;
pub mod media_store;
pub mod payloads;
pub mod pipeline;
pub mod processors;
pub mod state;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use agent::{AgentEnvelope, HttpAgentForwarder, agent_message};
pub use context::PipelineContext;
pub use escalation::{EscalationManager, IaLockState, normalize_phone};
pub use media_store::FsMediaStorage;
pub use pipeline::{Pipeline, spawn_media_purge};
pub use processors::{OutboundRequest, queue_outbound};
pub use webhook::{
    DispatchSummary, WebhookDispatcher, WebhookPayload, verify_signature, verify_subscription,
};
