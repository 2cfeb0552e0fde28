// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent forwarder that keeps every message it is handed.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hostdesk_core::{AgentForwarder, AgentMessage, HostdeskError};

#[derive(Default)]
pub struct RecordingAgent {
    messages: Mutex<Vec<AgentMessage>>,
}

impl RecordingAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<AgentMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Forwards run on spawned tasks; polls until `count` have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<AgentMessage> {
        for _ in 0..100 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.messages()
    }
}

#[async_trait]
impl AgentForwarder for RecordingAgent {
    async fn forward(&self, message: &AgentMessage) -> Result<(), HostdeskError> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        Ok(())
    }
}
