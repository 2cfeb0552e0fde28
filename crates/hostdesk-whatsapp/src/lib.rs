// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API channel gateway for Hostdesk.
//!
//! [`CloudApiGateway`] implements [`ChannelGateway`] for every tenant listed
//! in the channel directory, sending from the tenant's phone number id with
//! its access token.

pub mod client;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use hostdesk_config::HostdeskConfig;
use hostdesk_config::model::ChannelConfig;
use hostdesk_core::types::{
    AdapterType, HealthStatus, MediaPayload, OutboundMedia, SendReceipt, TemplateMessage,
};
use hostdesk_core::{ChannelGateway, HostdeskError, PluginAdapter};

use crate::client::CloudApiClient;
use crate::types::{ContactsResponse, MediaInfo, SendResponse};

pub struct CloudApiGateway {
    client: CloudApiClient,
    /// Channel credentials by tenant id.
    channels: HashMap<String, ChannelConfig>,
}

impl CloudApiGateway {
    pub fn new(config: &HostdeskConfig) -> Result<Self, HostdeskError> {
        let client = CloudApiClient::new(&config.whatsapp)?;
        let channels = config
            .channels
            .iter()
            .map(|c| (c.tenant_id.clone(), c.clone()))
            .collect();
        Ok(Self { client, channels })
    }

    fn channel(&self, tenant_id: &str) -> Result<&ChannelConfig, HostdeskError> {
        self.channels
            .get(tenant_id)
            .ok_or_else(|| HostdeskError::Config(format!("no WhatsApp channel configured for tenant {tenant_id}")))
    }

    async fn send(&self, tenant_id: &str, body: &Value) -> Result<SendReceipt, HostdeskError> {
        let channel = self.channel(tenant_id)?;
        let path = format!("{}/messages", channel.phone_number_id);
        let response: SendResponse = self.client.post(&channel.access_token, &path, body).await?;
        let id = response
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| HostdeskError::channel("WhatsApp API returned no message id"))?;
        Ok(SendReceipt {
            external_message_id: id,
        })
    }
}

#[async_trait]
impl PluginAdapter for CloudApiGateway {
    fn name(&self) -> &str {
        "whatsapp-cloud"
    }

    fn version(&self) -> semver::Version {
        semver::Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| semver::Version::new(0, 1, 0))
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, HostdeskError> {
        if self.channels.is_empty() {
            return Ok(HealthStatus::Degraded("no channels configured".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HostdeskError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelGateway for CloudApiGateway {
    async fn send_text(&self, tenant_id: &str, to: &str, text: &str) -> Result<SendReceipt, HostdeskError> {
        let receipt = self.send(tenant_id, &types::text_message(to, text)).await?;
        info!(tenant_id, external_message_id = %receipt.external_message_id, "text message sent");
        Ok(receipt)
    }

    async fn send_media(
        &self,
        tenant_id: &str,
        to: &str,
        media: &OutboundMedia,
    ) -> Result<SendReceipt, HostdeskError> {
        let receipt = self.send(tenant_id, &types::media_message(to, media)).await?;
        info!(tenant_id, kind = %media.kind, external_message_id = %receipt.external_message_id, "media message sent");
        Ok(receipt)
    }

    async fn send_template(
        &self,
        tenant_id: &str,
        to: &str,
        template: &TemplateMessage,
    ) -> Result<SendReceipt, HostdeskError> {
        let receipt = self.send(tenant_id, &types::template_message(to, template)).await?;
        info!(tenant_id, template = %template.name, external_message_id = %receipt.external_message_id, "template sent");
        Ok(receipt)
    }

    async fn mark_read(&self, tenant_id: &str, external_message_id: &str) {
        let result = async {
            let channel = self.channel(tenant_id)?;
            let path = format!("{}/messages", channel.phone_number_id);
            self.client
                .post::<Value>(&channel.access_token, &path, &types::read_receipt(external_message_id))
                .await
        }
        .await;
        match result {
            Ok(_) => debug!(tenant_id, external_message_id, "marked as read"),
            Err(e) => warn!(tenant_id, external_message_id, error = %e, "failed to mark message as read"),
        }
    }

    /// Resolves the media id to a short-lived URL, then downloads it with
    /// the same credentials.
    async fn download_media(&self, tenant_id: &str, media_id: &str) -> Result<MediaPayload, HostdeskError> {
        let channel = self.channel(tenant_id)?;
        let info: MediaInfo = self.client.get(&channel.access_token, media_id).await?;
        let download = self.client.download(&channel.access_token, &info.url).await?;
        Ok(MediaPayload {
            bytes: download.bytes,
            mime_type: info.mime_type.or(download.content_type),
        })
    }

    async fn get_profile_picture(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<String>, HostdeskError> {
        let channel = self.channel(tenant_id)?;
        let path = format!("{}/contacts", channel.phone_number_id);
        let response: ContactsResponse = self
            .client
            .post(&channel.access_token, &path, &types::contacts_lookup(phone_number))
            .await?;
        Ok(response
            .contacts
            .into_iter()
            .find_map(|c| c.profile.and_then(|p| p.photo)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostdesk_core::types::MediaKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TENANT: &str = "hotel-a";
    const PHONE_ID: &str = "100200300";
    const TOKEN: &str = "token-a";

    fn gateway(server: &MockServer) -> CloudApiGateway {
        let mut config = HostdeskConfig::default();
        config.whatsapp.api_base_url = server.uri();
        config.channels = vec![ChannelConfig {
            phone_number_id: PHONE_ID.into(),
            tenant_id: TENANT.into(),
            access_token: TOKEN.into(),
        }];
        CloudApiGateway::new(&config).unwrap()
    }

    fn sent(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "messaging_product": "whatsapp",
            "contacts": [{"input": "5511987654321", "wa_id": "5511987654321"}],
            "messages": [{"id": id}]
        }))
    }

    #[tokio::test]
    async fn send_text_posts_to_phone_number_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v21.0/{PHONE_ID}/messages")))
            .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
            .and(body_partial_json(json!({"type": "text", "text": {"body": "Olá"}})))
            .respond_with(sent("wamid.OUT1"))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = gateway(&server).send_text(TENANT, "5511987654321", "Olá").await.unwrap();
        assert_eq!(receipt.external_message_id, "wamid.OUT1");
    }

    #[tokio::test]
    async fn send_media_uses_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v21.0/{PHONE_ID}/messages")))
            .and(body_partial_json(json!({"type": "image", "image": {"link": "https://cdn.example/q.jpg"}})))
            .respond_with(sent("wamid.IMG"))
            .mount(&server)
            .await;

        let media = OutboundMedia {
            kind: MediaKind::Image,
            url: "https://cdn.example/q.jpg".into(),
            caption: None,
            filename: None,
        };
        let receipt = gateway(&server).send_media(TENANT, "5511987654321", &media).await.unwrap();
        assert_eq!(receipt.external_message_id, "wamid.IMG");
    }

    #[tokio::test]
    async fn rejected_send_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Recipient phone number not in allowed list", "code": 131030, "type": "OAuthException"}
            })))
            .mount(&server)
            .await;

        let err = gateway(&server).send_text(TENANT, "5511987654321", "Oi").await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("131030"), "got: {err}");
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = gateway(&server).send_text(TENANT, "5511987654321", "Oi").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unknown_tenant_is_a_config_error() {
        let server = MockServer::start().await;
        let err = gateway(&server).send_text("hotel-x", "5511987654321", "Oi").await.unwrap_err();
        assert!(matches!(err, HostdeskError::Config(_)));
    }

    #[tokio::test]
    async fn download_media_follows_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v21.0/media-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/files/media-9", server.uri()),
                "mime_type": "audio/ogg; codecs=opus",
                "id": "media-9"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/media-9"))
            .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"OggS".to_vec()))
            .mount(&server)
            .await;

        let payload = gateway(&server).download_media(TENANT, "media-9").await.unwrap();
        assert_eq!(payload.bytes, b"OggS");
        assert_eq!(payload.mime_type.as_deref(), Some("audio/ogg; codecs=opus"));
    }

    #[tokio::test]
    async fn mark_read_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        gateway(&server).mark_read(TENANT, "wamid.IN1").await;
    }

    #[tokio::test]
    async fn profile_picture_from_contacts_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v21.0/{PHONE_ID}/contacts")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "contacts": [{"wa_id": "5511987654321", "profile": {"photo": "https://pps.example/p.jpg"}}]
            })))
            .mount(&server)
            .await;

        let url = gateway(&server)
            .get_profile_picture(TENANT, "5511987654321")
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("https://pps.example/p.jpg"));
    }
}
