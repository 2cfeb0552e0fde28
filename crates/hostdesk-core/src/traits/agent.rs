// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hand-off of inbound messages to the automated agent.

use async_trait::async_trait;

use crate::error::HostdeskError;
use crate::types::AgentMessage;

/// Delivers inbound messages to the automated agent workflow.
///
/// Callers never wait on the agent; a failed delivery is logged and the
/// message stays stored.
#[async_trait]
pub trait AgentForwarder: Send + Sync + 'static {
    async fn forward(&self, message: &AgentMessage) -> Result<(), HostdeskError>;
}
