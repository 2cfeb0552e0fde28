// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta webhook payloads and the dispatcher that turns them into jobs.
//!
//! WhatsApp deliveries carry `entry[].changes[]`; Messenger (`page`) and
//! Instagram deliveries carry `entry[].messaging[]` keyed by the page id.
//!
//! The dispatcher only classifies and enqueues. It never touches the entity
//! store or the channel gateway, so the HTTP handler can acknowledge the
//! provider as soon as the jobs are durable.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use tracing::{debug, info, warn};

use hostdesk_config::HostdeskConfig;
use hostdesk_config::model::PageChannel;
use hostdesk_core::HostdeskError;
use hostdesk_queue::{JobQueue, QueueName};

use crate::payloads::{IncomingMessageJob, PageMessageJob, StatusUpdateJob};

type HmacSha256 = Hmac<Sha256>;

/// `object` value of WhatsApp Business webhooks.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";
pub const MESSENGER_OBJECT: &str = "page";
pub const INSTAGRAM_OBJECT: &str = "instagram";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
    #[serde(default)]
    pub messaging: Vec<PageEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub metadata: Option<ChannelMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<StatusEvent>,
}

/// Identity of the receiving channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelMetadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub profile: Option<ContactProfile>,
    #[serde(default)]
    pub wa_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: Option<String>,
}

// --- Inbound message ---

/// One customer message as delivered by the provider.
///
/// Fields this crate does not model (reactions, orders, ...) are kept in
/// `extra` so the message survives a round trip through a job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    /// Unix seconds, as a decimal string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<MediaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<ButtonBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<InteractiveBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<SharedContact>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundMessage {
    /// Text body of a `text` message.
    pub fn text_body(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.text.as_ref().map(|t| t.body.as_str())
    }

    /// Provider timestamp in milliseconds, `None` when it is not a number.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.timestamp.trim().parse::<i64>().ok().map(|s| s * 1000)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBody {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// `button` object: a template quick reply (`payload` + `text`) or the older
/// `button_reply` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<Reply>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveBody {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_reply: Option<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfm_reply: Option<FlowReply>,
}

/// Response of a WhatsApp Flow form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub response_json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<SharedContactName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<SharedContactPhone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<SharedContactEmail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedContactName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedContactPhone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedContactEmail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// --- Status event ---

/// Delivery receipt for an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// External id of the message the receipt is about.
    pub id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StatusError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<StatusConversation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<StatusPricing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<StatusErrorData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusErrorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<StatusOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusOrigin {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

// --- Page events ---

/// One Messenger or Instagram messaging event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PageParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<PageParty>,
    /// Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<PageMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postback: Option<PagePostback>,
}

/// Page-scoped user or page id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageParty {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    pub mid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on copies of messages the page itself sent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_echo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_reply: Option<QuickReply>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PageAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReply {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A tap on a persistent menu item or a template button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePostback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Queue that processes events of `channel`.
pub fn page_queue(channel: PageChannel) -> QueueName {
    match channel {
        PageChannel::Messenger => QueueName::Messenger,
        PageChannel::Instagram => QueueName::Instagram,
    }
}

// --- Verification ---

/// Checks `X-Hub-Signature-256` (`sha256=<hex>`) against the raw body.
pub fn verify_signature(
    app_secret: &str,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), HostdeskError> {
    let header = header
        .ok_or_else(|| HostdeskError::Forbidden("missing webhook signature".into()))?;
    let hex_sig = header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| HostdeskError::Forbidden("signature header missing sha256= prefix".into()))?;
    let expected = hex::decode(hex_sig)
        .map_err(|e| HostdeskError::Forbidden(format!("invalid hex in signature: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| HostdeskError::Internal(format!("HMAC key error: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| HostdeskError::Forbidden("webhook signature mismatch".into()))
}

/// Answers the GET subscription handshake. Returns the challenge to echo
/// when the mode is `subscribe` and the token matches.
pub fn verify_subscription(
    expected_token: Option<&str>,
    mode: &str,
    token: &str,
    challenge: &str,
) -> Option<String> {
    let expected = expected_token?;
    (mode == "subscribe" && token == expected).then(|| challenge.to_string())
}

// --- Dispatcher ---

/// What a webhook delivery turned into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub messages: usize,
    pub statuses: usize,
    pub dropped: usize,
}

/// Classifies webhook deliveries and enqueues one job per message or status.
#[derive(Clone)]
pub struct WebhookDispatcher {
    config: Arc<HostdeskConfig>,
    jobs: JobQueue,
}

impl WebhookDispatcher {
    pub fn new(config: Arc<HostdeskConfig>, jobs: JobQueue) -> Self {
        Self { config, jobs }
    }

    /// Enqueues the units of work in `payload`.
    ///
    /// Unsupported objects, fields and unknown channels are logged and
    /// dropped. Only enqueue failures are returned.
    pub async fn dispatch(&self, payload: &WebhookPayload) -> Result<DispatchSummary, HostdeskError> {
        let mut summary = DispatchSummary::default();
        match payload.object.as_str() {
            WHATSAPP_OBJECT => {
                for entry in &payload.entry {
                    for change in &entry.changes {
                        self.dispatch_change(change, &mut summary).await?;
                    }
                }
            }
            MESSENGER_OBJECT => {
                self.dispatch_page(PageChannel::Messenger, payload, &mut summary).await?;
            }
            INSTAGRAM_OBJECT => {
                self.dispatch_page(PageChannel::Instagram, payload, &mut summary).await?;
            }
            other => {
                warn!(object = other, "ignoring webhook for unsupported object");
                summary.dropped += 1;
                return Ok(summary);
            }
        }

        if summary.messages + summary.statuses > 0 {
            info!(
                messages = summary.messages,
                statuses = summary.statuses,
                dropped = summary.dropped,
                "webhook dispatched"
            );
        }
        Ok(summary)
    }

    async fn dispatch_page(
        &self,
        channel: PageChannel,
        payload: &WebhookPayload,
        summary: &mut DispatchSummary,
    ) -> Result<(), HostdeskError> {
        let queue = page_queue(channel);
        for entry in &payload.entry {
            let page = entry
                .id
                .as_deref()
                .and_then(|page_id| self.config.page(channel, page_id));
            let Some(page) = page else {
                warn!(page_id = ?entry.id, ?channel, "webhook for unknown page, dropping");
                summary.dropped += entry.messaging.len();
                continue;
            };
            for event in &entry.messaging {
                let Some(job) = PageMessageJob::from_event(&page.tenant_id, event) else {
                    debug!(?channel, "ignoring page event without a customer message");
                    summary.dropped += 1;
                    continue;
                };
                let options = self.jobs.options(queue).with_dedup_key(job.dedup_key());
                self.jobs.enqueue(queue, &job, options).await?;
                summary.messages += 1;
            }
        }
        Ok(())
    }

    async fn dispatch_change(
        &self,
        change: &WebhookChange,
        summary: &mut DispatchSummary,
    ) -> Result<(), HostdeskError> {
        let value = &change.value;
        let units = value.messages.len() + value.statuses.len();
        let include_messages = match change.field.as_str() {
            "messages" => true,
            "message_status" => false,
            other => {
                debug!(field = other, "ignoring webhook change");
                summary.dropped += 1;
                return Ok(());
            }
        };

        let Some(phone_number_id) = value.metadata.as_ref().map(|m| m.phone_number_id.as_str())
        else {
            warn!(field = %change.field, "webhook change without channel metadata");
            summary.dropped += units;
            return Ok(());
        };
        let Some(tenant_id) = self.config.tenant_for_phone_number_id(phone_number_id) else {
            warn!(phone_number_id, "webhook for unknown channel, dropping");
            summary.dropped += units;
            return Ok(());
        };

        if include_messages {
            let contact_name = value
                .contacts
                .first()
                .and_then(|c| c.profile.as_ref())
                .and_then(|p| p.name.clone());
            for message in &value.messages {
                let job = IncomingMessageJob {
                    tenant_id: tenant_id.to_string(),
                    message: message.clone(),
                    contact_name: contact_name.clone(),
                };
                let options = self
                    .jobs
                    .options(QueueName::Incoming)
                    .with_dedup_key(job.dedup_key());
                self.jobs.enqueue(QueueName::Incoming, &job, options).await?;
                summary.messages += 1;
            }
        } else if !value.messages.is_empty() {
            summary.dropped += value.messages.len();
        }

        for status in &value.statuses {
            let job = StatusUpdateJob {
                tenant_id: tenant_id.to_string(),
                status: status.clone(),
            };
            let options = self
                .jobs
                .options(QueueName::Status)
                .with_dedup_key(job.dedup_key());
            self.jobs.enqueue(QueueName::Status, &job, options).await?;
            summary.statuses += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostdesk_test_utils::TestHarness;
    use serde_json::json;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn delivery(phone_number_id: &str) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "551100000000", "phone_number_id": phone_number_id},
                        "contacts": [{"profile": {"name": "Maria"}, "wa_id": "5511988887777"}],
                        "messages": [
                            {"id": "wamid.A", "from": "5511988887777", "timestamp": "1767225600", "type": "text", "text": {"body": "Olá"}},
                            {"id": "wamid.B", "from": "5511988887777", "timestamp": "1767225601", "type": "reaction", "reaction": {"emoji": "👍", "message_id": "wamid.X"}}
                        ],
                        "statuses": [
                            {"id": "wamid.OUT", "status": "delivered", "timestamp": "1767225602", "recipient_id": "5511988887777"}
                        ]
                    }
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = sign("s3cret", body);
        assert!(verify_signature("s3cret", body, Some(&header)).is_ok());
    }

    #[test]
    fn signature_rejects_tampering_and_bad_headers() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = sign("s3cret", body);
        let err = verify_signature("s3cret", b"{}", Some(&header)).unwrap_err();
        assert!(matches!(err, HostdeskError::Forbidden(_)));
        assert!(verify_signature("other", body, Some(&header)).is_err());
        assert!(verify_signature("s3cret", body, None).is_err());
        assert!(verify_signature("s3cret", body, Some("md5=abcd")).is_err());
        assert!(verify_signature("s3cret", body, Some("sha256=zz")).is_err());
    }

    #[test]
    fn subscription_handshake() {
        assert_eq!(
            verify_subscription(Some("tok"), "subscribe", "tok", "1234"),
            Some("1234".to_string())
        );
        assert_eq!(verify_subscription(Some("tok"), "subscribe", "nope", "1234"), None);
        assert_eq!(verify_subscription(Some("tok"), "unsubscribe", "tok", "1234"), None);
        assert_eq!(verify_subscription(None, "subscribe", "tok", "1234"), None);
    }

    #[test]
    fn unknown_message_fields_survive_round_trip() {
        let payload = delivery("1001");
        let reaction = &payload.entry[0].changes[0].value.messages[1];
        assert_eq!(reaction.kind, "reaction");
        let json = serde_json::to_value(reaction).unwrap();
        assert_eq!(json["reaction"]["emoji"], "👍");
        let back: InboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(&back, reaction);
    }

    #[test]
    fn timestamp_is_converted_to_millis() {
        let payload = delivery("1001");
        let msg = &payload.entry[0].changes[0].value.messages[0];
        assert_eq!(msg.timestamp_millis(), Some(1_767_225_600_000));
        assert_eq!(msg.text_body(), Some("Olá"));
    }

    #[tokio::test]
    async fn dispatch_enqueues_one_job_per_unit() {
        let harness = TestHarness::builder().build().await.unwrap();
        let dispatcher = WebhookDispatcher::new(Arc::new(harness.config.clone()), harness.jobs.clone());

        let summary = dispatcher.dispatch(&delivery(TestHarness::PHONE_NUMBER_ID)).await.unwrap();
        assert_eq!(summary, DispatchSummary { messages: 2, statuses: 1, dropped: 0 });

        let incoming = harness.jobs.counts(QueueName::Incoming).await.unwrap();
        assert_eq!(incoming.waiting, 2);
        let status = harness.jobs.counts(QueueName::Status).await.unwrap();
        assert_eq!(status.waiting, 1);

        let job = harness.jobs.claim(QueueName::Incoming).await.unwrap().unwrap();
        let decoded: IncomingMessageJob = job.decode().unwrap();
        assert_eq!(decoded.tenant_id, TestHarness::TENANT_ID);
        assert_eq!(decoded.contact_name.as_deref(), Some("Maria"));
        assert_eq!(job.dedup_key.as_deref(), Some("msg-wamid.A"));
        harness.close().await;
    }

    #[tokio::test]
    async fn redelivered_webhook_is_deduplicated() {
        let harness = TestHarness::builder().build().await.unwrap();
        let dispatcher = WebhookDispatcher::new(Arc::new(harness.config.clone()), harness.jobs.clone());
        let payload = delivery(TestHarness::PHONE_NUMBER_ID);

        dispatcher.dispatch(&payload).await.unwrap();
        dispatcher.dispatch(&payload).await.unwrap();

        assert_eq!(harness.jobs.counts(QueueName::Incoming).await.unwrap().waiting, 2);
        assert_eq!(harness.jobs.counts(QueueName::Status).await.unwrap().waiting, 1);
        harness.close().await;
    }

    #[tokio::test]
    async fn unknown_channel_and_objects_are_dropped() {
        let harness = TestHarness::builder().build().await.unwrap();
        let dispatcher = WebhookDispatcher::new(Arc::new(harness.config.clone()), harness.jobs.clone());

        let summary = dispatcher.dispatch(&delivery("9999")).await.unwrap();
        assert_eq!(summary, DispatchSummary { messages: 0, statuses: 0, dropped: 3 });

        let other: WebhookPayload = serde_json::from_value(json!({"object": "user", "entry": []})).unwrap();
        let summary = dispatcher.dispatch(&other).await.unwrap();
        assert_eq!(summary.dropped, 1);

        let other_field: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"field": "account_update", "value": {}}]}]
        }))
        .unwrap();
        let summary = dispatcher.dispatch(&other_field).await.unwrap();
        assert_eq!(summary.dropped, 1);

        assert_eq!(harness.jobs.counts(QueueName::Incoming).await.unwrap().waiting, 0);
        harness.close().await;
    }

    #[tokio::test]
    async fn message_status_field_only_enqueues_statuses() {
        let harness = TestHarness::builder().build().await.unwrap();
        let dispatcher = WebhookDispatcher::new(Arc::new(harness.config.clone()), harness.jobs.clone());
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{
                "field": "message_status",
                "value": {
                    "metadata": {"phone_number_id": TestHarness::PHONE_NUMBER_ID},
                    "statuses": [
                        {"id": "wamid.1", "status": "sent", "timestamp": "1"},
                        {"id": "wamid.1", "status": "delivered", "timestamp": "1"}
                    ]
                }
            }]}]
        }))
        .unwrap();

        let summary = dispatcher.dispatch(&payload).await.unwrap();
        assert_eq!(summary.statuses, 2);
        assert_eq!(harness.jobs.counts(QueueName::Status).await.unwrap().waiting, 2);
        harness.close().await;
    }

    fn page_delivery(object: &str, page_id: &str) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": object,
            "entry": [{
                "id": page_id,
                "time": 1767225600000_i64,
                "messaging": [
                    {"sender": {"id": "u1"}, "recipient": {"id": page_id}, "timestamp": 1767225600000_i64,
                     "message": {"mid": "m.1", "text": "Oi"}},
                    {"sender": {"id": page_id}, "recipient": {"id": "u1"}, "timestamp": 1767225600001_i64,
                     "message": {"mid": "m.2", "text": "Olá!", "is_echo": true}},
                    {"sender": {"id": "u1"}, "recipient": {"id": page_id}, "timestamp": 1767225600002_i64,
                     "postback": {"mid": "m.3", "title": "Reservar", "payload": "BOOK"}}
                ]
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn page_events_go_to_their_channel_queue() {
        let harness = TestHarness::builder().build().await.unwrap();
        let dispatcher = WebhookDispatcher::new(Arc::new(harness.config.clone()), harness.jobs.clone());

        let summary = dispatcher
            .dispatch(&page_delivery(MESSENGER_OBJECT, TestHarness::MESSENGER_PAGE_ID))
            .await
            .unwrap();
        assert_eq!(summary, DispatchSummary { messages: 2, statuses: 0, dropped: 1 });
        assert_eq!(harness.jobs.counts(QueueName::Messenger).await.unwrap().waiting, 2);

        let summary = dispatcher
            .dispatch(&page_delivery(INSTAGRAM_OBJECT, TestHarness::INSTAGRAM_ACCOUNT_ID))
            .await
            .unwrap();
        assert_eq!(summary.messages, 2);
        let job = harness.jobs.claim(QueueName::Instagram).await.unwrap().unwrap();
        let decoded: PageMessageJob = job.decode().unwrap();
        assert_eq!(decoded.tenant_id, TestHarness::TENANT_ID);
        assert_eq!(decoded.sender_id, "u1");
        assert!(job.dedup_key.as_deref().is_some_and(|k| k.starts_with("page-m.")));
        harness.close().await;
    }

    #[tokio::test]
    async fn page_id_is_resolved_per_channel() {
        let harness = TestHarness::builder().build().await.unwrap();
        let dispatcher = WebhookDispatcher::new(Arc::new(harness.config.clone()), harness.jobs.clone());

        // The Instagram account id is not a Messenger page.
        let summary = dispatcher
            .dispatch(&page_delivery(MESSENGER_OBJECT, TestHarness::INSTAGRAM_ACCOUNT_ID))
            .await
            .unwrap();
        assert_eq!(summary, DispatchSummary { messages: 0, statuses: 0, dropped: 3 });
        assert_eq!(harness.jobs.counts(QueueName::Messenger).await.unwrap().waiting, 0);
        harness.close().await;
    }
}
