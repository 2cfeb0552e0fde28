// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed job payloads, one per queue, with their dedup keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::webhook::{InboundMessage, PageEvent, PageMessage, PagePostback, StatusEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessageJob {
    pub tenant_id: String,
    pub message: InboundMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

impl IncomingMessageJob {
    pub fn dedup_key(&self) -> String {
        format!("msg-{}", self.message.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateJob {
    pub tenant_id: String,
    pub status: StatusEvent,
}

impl StatusUpdateJob {
    pub fn dedup_key(&self) -> String {
        format!(
            "status-{}-{}-{}",
            self.status.id, self.status.status, self.status.timestamp
        )
    }
}

/// An outbound message already persisted as `PENDING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessageJob {
    pub tenant_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub to: String,
    /// Lowercase send type: `text`, `image`, `video`, `audio`, `document` or
    /// `template`.
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl OutgoingMessageJob {
    pub fn dedup_key(&self) -> String {
        format!("send-{}", self.message_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDownloadJob {
    pub tenant_id: String,
    pub message_id: String,
    pub media_id: String,
    /// `image`, `video`, `audio` or `document`.
    pub media_type: String,
    pub mime_type: String,
}

impl MediaDownloadJob {
    pub fn dedup_key(&self) -> String {
        format!("media-{}", self.media_id)
    }
}

/// A Messenger or Instagram customer message or postback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMessageJob {
    pub tenant_id: String,
    /// Page-scoped id of the customer.
    pub sender_id: String,
    /// `mid` of the message, or a stand-in for postbacks without one.
    pub message_id: String,
    /// Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<PageMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postback: Option<PagePostback>,
}

impl PageMessageJob {
    /// `None` for echoes of our own sends, receipts and events without a
    /// sender.
    pub fn from_event(tenant_id: &str, event: &PageEvent) -> Option<Self> {
        let sender_id = event.sender.as_ref()?.id.clone();
        let message = event.message.as_ref().filter(|m| !m.is_echo);
        let message_id = match (message, &event.postback) {
            (_, Some(postback)) => postback.mid.clone().unwrap_or_else(|| {
                format!("postback-{sender_id}-{}", event.timestamp.unwrap_or_default())
            }),
            (Some(message), None) => message.mid.clone(),
            (None, None) => return None,
        };
        Some(Self {
            tenant_id: tenant_id.to_string(),
            sender_id,
            message_id,
            timestamp: event.timestamp,
            message: message.cloned(),
            postback: event.postback.clone(),
        })
    }

    pub fn dedup_key(&self) -> String {
        format!("page-{}", self.message_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IaReactivationJob {
    pub tenant_id: String,
    pub conversation_id: String,
}

impl IaReactivationJob {
    /// Keyed by the lock time, so a newer follow-up lock schedules its own job.
    pub fn dedup_key(&self, locked_at_millis: i64) -> String {
        format!("reactivate-{}-{locked_at_millis}", self.conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payloads_use_camel_case_wire_names() {
        let job = MediaDownloadJob {
            tenant_id: "t1".into(),
            message_id: "m1".into(),
            media_id: "media-9".into(),
            media_type: "image".into(),
            mime_type: "image/jpeg".into(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["tenantId"], "t1");
        assert_eq!(json["mediaId"], "media-9");
        assert_eq!(job.dedup_key(), "media-media-9");
    }

    #[test]
    fn outgoing_type_field_is_renamed() {
        let job: OutgoingMessageJob = serde_json::from_value(json!({
            "tenantId": "t1",
            "conversationId": "c1",
            "messageId": "m1",
            "to": "5511999999999",
            "type": "text",
            "content": "Bom dia"
        }))
        .unwrap();
        assert_eq!(job.message_type, "text");
        assert!(job.metadata.is_none());
        assert_eq!(job.dedup_key(), "send-m1");
    }

    #[test]
    fn status_key_distinguishes_statuses_with_equal_timestamps() {
        let status = |s: &str| StatusUpdateJob {
            tenant_id: "t1".into(),
            status: StatusEvent {
                id: "wamid.1".into(),
                status: s.into(),
                timestamp: "100".into(),
                recipient_id: None,
                errors: vec![],
                conversation: None,
                pricing: None,
            },
        };
        assert_ne!(status("sent").dedup_key(), status("delivered").dedup_key());
    }

    #[test]
    fn reactivation_key_includes_lock_time() {
        let job = IaReactivationJob {
            tenant_id: "t1".into(),
            conversation_id: "c1".into(),
        };
        assert_eq!(job.dedup_key(1_000), "reactivate-c1-1000");
    }

    #[test]
    fn page_job_skips_echoes_and_receipts() {
        let event = |value: serde_json::Value| -> PageEvent { serde_json::from_value(value).unwrap() };

        let echo = event(json!({
            "sender": {"id": "page-1"},
            "message": {"mid": "m.echo", "text": "Olá!", "is_echo": true}
        }));
        assert!(PageMessageJob::from_event("t1", &echo).is_none());

        let read = event(json!({"sender": {"id": "u1"}, "read": {"watermark": 1}}));
        assert!(PageMessageJob::from_event("t1", &read).is_none());

        let text = event(json!({
            "sender": {"id": "u1"},
            "timestamp": 1_767_225_600_000_i64,
            "message": {"mid": "m.1", "text": "Oi"}
        }));
        let job = PageMessageJob::from_event("t1", &text).unwrap();
        assert_eq!(job.sender_id, "u1");
        assert_eq!(job.dedup_key(), "page-m.1");
    }

    #[test]
    fn postback_without_mid_gets_a_stable_id() {
        let event: PageEvent = serde_json::from_value(json!({
            "sender": {"id": "u1"},
            "timestamp": 42,
            "postback": {"title": "Reservar", "payload": "BOOK"}
        }))
        .unwrap();
        let job = PageMessageJob::from_event("t1", &event).unwrap();
        assert_eq!(job.message_id, "postback-u1-42");
        assert_eq!(
            PageMessageJob::from_event("t1", &event).unwrap().dedup_key(),
            job.dedup_key()
        );
    }
}
