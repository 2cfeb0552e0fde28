// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel gateway for deterministic testing.
//!
//! `MockGateway` implements `ChannelGateway` by capturing outbound sends for
//! assertion, serving media and profile pictures registered up front, and
//! failing a scripted number of sends.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use hostdesk_core::HostdeskError;
use hostdesk_core::traits::adapter::PluginAdapter;
use hostdesk_core::traits::channel::ChannelGateway;
use hostdesk_core::types::{
    AdapterType, HealthStatus, MediaPayload, OutboundMedia, SendReceipt, TemplateMessage,
};

/// One captured outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Text {
        tenant_id: String,
        to: String,
        text: String,
    },
    Media {
        tenant_id: String,
        to: String,
        media: OutboundMedia,
    },
    Template {
        tenant_id: String,
        to: String,
        template: TemplateMessage,
    },
}

impl SentMessage {
    pub fn to(&self) -> &str {
        match self {
            Self::Text { to, .. } | Self::Media { to, .. } | Self::Template { to, .. } => to,
        }
    }
}

/// A mock WhatsApp-like gateway.
///
/// Accepted sends get ids `wamid.mock-1`, `wamid.mock-2`, ... in call order.
pub struct MockGateway {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    read_marks: Arc<Mutex<Vec<String>>>,
    media: Arc<Mutex<HashMap<String, MediaPayload>>>,
    pictures: Arc<Mutex<HashMap<String, String>>>,
    failures_left: AtomicUsize,
    counter: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            read_marks: Arc::new(Mutex::new(Vec::new())),
            media: Arc::new(Mutex::new(HashMap::new())),
            pictures: Arc::new(Mutex::new(HashMap::new())),
            failures_left: AtomicUsize::new(0),
            counter: AtomicUsize::new(0),
        }
    }

    /// Makes the next `n` send calls fail with a retryable channel error.
    pub fn fail_next_sends(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Registers bytes returned by `download_media` for `media_id`.
    pub async fn with_media(&self, media_id: &str, bytes: Vec<u8>, mime_type: Option<&str>) {
        self.media.lock().await.insert(
            media_id.to_string(),
            MediaPayload {
                bytes,
                mime_type: mime_type.map(str::to_string),
            },
        );
    }

    /// Registers the profile picture URL of a phone number.
    pub async fn with_profile_picture(&self, phone_number: &str, url: &str) {
        self.pictures
            .lock()
            .await
            .insert(phone_number.to_string(), url.to_string());
    }

    /// All sends accepted so far.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// External ids passed to `mark_read`.
    pub async fn read_marks(&self) -> Vec<String> {
        self.read_marks.lock().await.clone()
    }

    async fn accept(&self, message: SentMessage) -> Result<SendReceipt, HostdeskError> {
        let scripted_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(HostdeskError::channel("mock gateway: scripted send failure"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().await.push(message);
        Ok(SendReceipt {
            external_message_id: format!("wamid.mock-{n}"),
        })
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockGateway {
    fn name(&self) -> &str {
        "mock-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, HostdeskError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HostdeskError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelGateway for MockGateway {
    async fn send_text(
        &self,
        tenant_id: &str,
        to: &str,
        text: &str,
    ) -> Result<SendReceipt, HostdeskError> {
        self.accept(SentMessage::Text {
            tenant_id: tenant_id.to_string(),
            to: to.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn send_media(
        &self,
        tenant_id: &str,
        to: &str,
        media: &OutboundMedia,
    ) -> Result<SendReceipt, HostdeskError> {
        self.accept(SentMessage::Media {
            tenant_id: tenant_id.to_string(),
            to: to.to_string(),
            media: media.clone(),
        })
        .await
    }

    async fn send_template(
        &self,
        tenant_id: &str,
        to: &str,
        template: &TemplateMessage,
    ) -> Result<SendReceipt, HostdeskError> {
        self.accept(SentMessage::Template {
            tenant_id: tenant_id.to_string(),
            to: to.to_string(),
            template: template.clone(),
        })
        .await
    }

    async fn mark_read(&self, _tenant_id: &str, external_message_id: &str) {
        self.read_marks
            .lock()
            .await
            .push(external_message_id.to_string());
    }

    async fn download_media(
        &self,
        _tenant_id: &str,
        media_id: &str,
    ) -> Result<MediaPayload, HostdeskError> {
        self.media
            .lock()
            .await
            .get(media_id)
            .cloned()
            .ok_or_else(|| HostdeskError::channel(format!("mock gateway: no media {media_id}")))
    }

    async fn get_profile_picture(
        &self,
        _tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<String>, HostdeskError> {
        Ok(self.pictures.lock().await.get(phone_number).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_are_captured_with_sequential_ids() {
        let gateway = MockGateway::new();
        let first = gateway.send_text("t1", "5511", "Olá").await.unwrap();
        let second = gateway.send_text("t1", "5511", "Tudo bem?").await.unwrap();
        assert_eq!(first.external_message_id, "wamid.mock-1");
        assert_eq!(second.external_message_id, "wamid.mock-2");
        assert_eq!(gateway.sent_count().await, 2);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let gateway = MockGateway::new();
        gateway.fail_next_sends(1);
        let err = gateway.send_text("t1", "5511", "x").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(gateway.send_text("t1", "5511", "x").await.is_ok());
        assert_eq!(gateway.sent_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_media_is_an_error() {
        let gateway = MockGateway::new();
        gateway.with_media("m1", vec![1, 2, 3], Some("image/png")).await;
        assert_eq!(gateway.download_media("t1", "m1").await.unwrap().bytes, vec![1, 2, 3]);
        assert!(gateway.download_media("t1", "m2").await.is_err());
    }
}
