// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hand-off of customer messages to the automation agent.
//!
//! Each stored inbound message is posted as `{"body": <message>}` to the
//! configured webhook. The payload keeps the field names automation flows
//! already consume (`text.message`, `image.url`, `buttonReply`, ...).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use hostdesk_config::model::AgentConfig;
use hostdesk_core::types::{Channel, Conversation, Message, MessageType};
use hostdesk_core::{AgentForwarder, AgentMessage, HostdeskError};

/// Forwards over HTTP. Without a webhook URL every forward is a no-op.
#[derive(Debug, Clone)]
pub struct HttpAgentForwarder {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl HttpAgentForwarder {
    pub fn new(config: &AgentConfig) -> Result<Self, HostdeskError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostdeskError::Channel {
                message: format!("failed to build agent HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            url: config.webhook_url.clone(),
            timeout,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl AgentForwarder for HttpAgentForwarder {
    async fn forward(&self, message: &AgentMessage) -> Result<(), HostdeskError> {
        let Some(url) = &self.url else {
            debug!(tenant_id = %message.tenant_id, "no agent webhook configured");
            return Ok(());
        };
        let response = self
            .client
            .post(url)
            .json(&json!({ "body": message }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HostdeskError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    HostdeskError::Channel {
                        message: format!("agent webhook request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostdeskError::channel(format!(
                "agent webhook returned {status}: {body}"
            )));
        }
        debug!(tenant_id = %message.tenant_id, message_id = %message.message_id, status = %status, "message forwarded to agent");
        Ok(())
    }
}

/// Who sent the message and where the conversation stands.
pub struct AgentEnvelope<'a> {
    pub sender: &'a str,
    pub contact_name: Option<&'a str>,
    pub is_new_conversation: bool,
    pub channel: Channel,
}

/// Builds the agent payload for a stored inbound message.
pub fn agent_message(
    message: &Message,
    conversation: &Conversation,
    envelope: AgentEnvelope<'_>,
) -> AgentMessage {
    let (kind, content) = agent_content(message);
    AgentMessage {
        tenant_id: message.tenant_id.clone(),
        phone: envelope.sender.to_string(),
        kind: kind.to_string(),
        content,
        message_id: message.id.clone(),
        timestamp: message.timestamp.timestamp(),
        contact_name: envelope.contact_name.map(str::to_string),
        conversation_id: conversation.id.clone(),
        is_new_conversation: envelope.is_new_conversation,
        channel: envelope.channel.key().to_string(),
    }
}

fn section(pairs: &[(&str, Option<&Value>)]) -> Value {
    let map: Map<String, Value> = pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.clone())))
        .collect();
    Value::Object(map)
}

fn agent_content(message: &Message) -> (&'static str, Map<String, Value>) {
    let meta = |key: &str| message.metadata.get(key).filter(|v| !v.is_null());
    let mut content = Map::new();
    let text = json!({ "message": message.content });

    let kind = match message.message_type {
        MessageType::Image => {
            let sticker = meta("isSticker").and_then(Value::as_bool).unwrap_or(false);
            content.insert(
                "image".into(),
                section(&[("url", meta("mediaUrl")), ("caption", meta("caption"))]),
            );
            if sticker { "sticker" } else { "image" }
        }
        MessageType::Video => {
            content.insert(
                "video".into(),
                section(&[("url", meta("mediaUrl")), ("caption", meta("caption"))]),
            );
            "video"
        }
        MessageType::Audio => {
            content.insert("audio".into(), section(&[("url", meta("mediaUrl"))]));
            "audio"
        }
        MessageType::Document => {
            content.insert(
                "document".into(),
                section(&[
                    ("url", meta("mediaUrl")),
                    ("filename", meta("filename")),
                    ("caption", meta("caption")),
                ]),
            );
            "document"
        }
        MessageType::Location => {
            let coords: Option<Value> = serde_json::from_str(&message.content).ok();
            let lat = coords.as_ref().and_then(|c| c.get("latitude")).filter(|v| v.is_number());
            let lng = coords.as_ref().and_then(|c| c.get("longitude")).filter(|v| v.is_number());
            match (lat, lng) {
                (Some(lat), Some(lng)) => {
                    content.insert(
                        "location".into(),
                        section(&[
                            ("latitude", Some(lat)),
                            ("longitude", Some(lng)),
                            ("name", meta("name")),
                            ("address", meta("address")),
                        ]),
                    );
                    "location"
                }
                _ => {
                    content.insert("text".into(), text);
                    "text"
                }
            }
        }
        _ => {
            content.insert("text".into(), text);
            if let Some(list) = meta("list") {
                content.insert(
                    "listResponseMessage".into(),
                    section(&[
                        ("selectedRowId", list.get("id")),
                        ("title", list.get("title")),
                        ("description", list.get("description")),
                    ]),
                );
                "list"
            } else if let Some(button) = meta("button") {
                content.insert(
                    "buttonReply".into(),
                    section(&[("id", button.get("id")), ("title", button.get("title"))]),
                );
                content.insert(
                    "buttonResponseMessage".into(),
                    section(&[
                        ("selectedButtonId", button.get("id")),
                        ("selectedButtonText", button.get("title")),
                    ]),
                );
                "button_reply"
            } else {
                "text"
            }
        }
    };
    (kind, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hostdesk_core::types::{ConversationStatus, Direction, MessageStatus, Priority};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stored(message_type: MessageType, content: &str, metadata: Value) -> Message {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        Message {
            id: "m1".into(),
            tenant_id: "hotel-a".into(),
            conversation_id: "c1".into(),
            external_message_id: Some("wamid.1".into()),
            direction: Direction::Inbound,
            message_type,
            content: content.into(),
            metadata,
            status: MessageStatus::Delivered,
            timestamp: at,
            created_at: at,
        }
    }

    fn conversation() -> Conversation {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        Conversation {
            id: "c1".into(),
            tenant_id: "hotel-a".into(),
            contact_id: "k1".into(),
            status: ConversationStatus::Open,
            priority: Priority::Medium,
            assigned_to_id: None,
            hotel_unit: None,
            ia_locked: false,
            ia_locked_at: None,
            ia_locked_by: None,
            last_message_at: at,
            closed_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn payload(message: &Message) -> Value {
        let envelope = AgentEnvelope {
            sender: "5511999990000",
            contact_name: Some("Ana"),
            is_new_conversation: false,
            channel: Channel::WhatsApp,
        };
        serde_json::to_value(agent_message(message, &conversation(), envelope)).unwrap()
    }

    #[test]
    fn text_message_payload() {
        let json = payload(&stored(MessageType::Text, "Oi", json!({})));
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"]["message"], "Oi");
        assert_eq!(json["phone"], "5511999990000");
        assert_eq!(json["timestamp"], 1_767_268_800);
        assert_eq!(json["channel"], "whatsapp");
        assert_eq!(json["contactName"], "Ana");
    }

    #[test]
    fn button_and_list_replies_are_typed() {
        let button = payload(&stored(
            MessageType::Text,
            "Sim",
            json!({"button": {"id": "yes", "title": "Sim"}}),
        ));
        assert_eq!(button["type"], "button_reply");
        assert_eq!(button["buttonReply"]["id"], "yes");
        assert_eq!(button["buttonResponseMessage"]["selectedButtonText"], "Sim");

        let list = payload(&stored(
            MessageType::Text,
            "Suite",
            json!({"list": {"id": "r2", "title": "Suite"}}),
        ));
        assert_eq!(list["type"], "list");
        assert_eq!(list["listResponseMessage"]["selectedRowId"], "r2");
        assert!(list["listResponseMessage"].get("description").is_none());
    }

    #[test]
    fn media_and_sticker_sections() {
        let doc = payload(&stored(
            MessageType::Document,
            "media-1",
            json!({"filename": "voucher.pdf", "mediaUrl": "http://m/v.pdf"}),
        ));
        assert_eq!(doc["type"], "document");
        assert_eq!(doc["document"], json!({"url": "http://m/v.pdf", "filename": "voucher.pdf"}));

        let sticker = payload(&stored(MessageType::Image, "media-2", json!({"isSticker": true})));
        assert_eq!(sticker["type"], "sticker");
        assert_eq!(sticker["image"], json!({}));
    }

    #[test]
    fn unreadable_location_falls_back_to_text() {
        let ok = payload(&stored(
            MessageType::Location,
            r#"{"latitude":-23.5,"longitude":-46.6}"#,
            json!({"name": "Praia"}),
        ));
        assert_eq!(ok["type"], "location");
        assert_eq!(ok["location"]["name"], "Praia");

        let bad = payload(&stored(MessageType::Location, "somewhere", json!({})));
        assert_eq!(bad["type"], "text");
        assert_eq!(bad["text"]["message"], "somewhere");
    }

    fn forwarder(url: Option<String>) -> HttpAgentForwarder {
        HttpAgentForwarder::new(&AgentConfig {
            webhook_url: url,
            timeout_secs: 2,
        })
        .unwrap()
    }

    fn sample() -> AgentMessage {
        let envelope = AgentEnvelope {
            sender: "5511999990000",
            contact_name: None,
            is_new_conversation: true,
            channel: Channel::WhatsApp,
        };
        agent_message(&stored(MessageType::Text, "Oi", json!({})), &conversation(), envelope)
    }

    #[tokio::test]
    async fn posts_message_wrapped_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/hotel"))
            .and(body_partial_json(json!({
                "body": {"phone": "5511999990000", "type": "text", "isNewConversation": true}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let agent = forwarder(Some(format!("{}/webhook/hotel", server.uri())));
        assert!(agent.is_enabled());
        agent.forward(&sample()).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_forward_is_a_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("flow crashed"))
            .mount(&server)
            .await;

        let err = forwarder(Some(server.uri())).forward(&sample()).await.unwrap_err();
        assert!(matches!(err, HostdeskError::Channel { ref message, .. } if message.contains("flow crashed")));
    }

    #[tokio::test]
    async fn unconfigured_forwarder_does_nothing() {
        let agent = forwarder(None);
        assert!(!agent.is_enabled());
        agent.forward(&sample()).await.unwrap();
    }
}
