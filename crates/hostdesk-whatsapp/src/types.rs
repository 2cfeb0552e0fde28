// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloud API request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use hostdesk_core::types::{MediaKind, OutboundMedia, TemplateMessage};

const MESSAGING_PRODUCT: &str = "whatsapp";

// --- Requests ---

/// Body of `POST /{phone_number_id}/messages`.
pub fn text_message(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": MESSAGING_PRODUCT,
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "preview_url": false, "body": body },
    })
}

pub fn media_message(to: &str, media: &OutboundMedia) -> Value {
    let mut object = Map::new();
    object.insert("link".into(), json!(media.url));
    if let Some(caption) = media.caption.as_deref().filter(|c| !c.is_empty()) {
        // Audio and stickers do not take captions.
        if !matches!(media.kind, MediaKind::Audio | MediaKind::Sticker) {
            object.insert("caption".into(), json!(caption));
        }
    }
    if media.kind == MediaKind::Document
        && let Some(filename) = &media.filename
    {
        object.insert("filename".into(), json!(filename));
    }

    let kind = media.kind.to_string();
    let mut body = Map::new();
    body.insert("messaging_product".into(), json!(MESSAGING_PRODUCT));
    body.insert("recipient_type".into(), json!("individual"));
    body.insert("to".into(), json!(to));
    body.insert("type".into(), json!(kind));
    body.insert(kind, Value::Object(object));
    Value::Object(body)
}

pub fn template_message(to: &str, template: &TemplateMessage) -> Value {
    let mut payload = json!({
        "name": template.name,
        "language": { "code": template.language_code },
    });
    if !template.parameters.is_empty() {
        let parameters: Vec<Value> = template
            .parameters
            .iter()
            .map(|p| json!({ "type": "text", "text": p }))
            .collect();
        payload["components"] = json!([{ "type": "body", "parameters": parameters }]);
    }
    json!({
        "messaging_product": MESSAGING_PRODUCT,
        "to": to,
        "type": "template",
        "template": payload,
    })
}

pub fn read_receipt(message_id: &str) -> Value {
    json!({
        "messaging_product": MESSAGING_PRODUCT,
        "status": "read",
        "message_id": message_id,
    })
}

pub fn contacts_lookup(phone_number: &str) -> Value {
    json!({
        "blocking": "wait",
        "contacts": [phone_number],
        "force_check": true,
    })
}

// --- Responses ---

#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentId {
    pub id: String,
}

/// Metadata returned by `GET /{media_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactsResponse {
    #[serde(default)]
    pub contacts: Vec<ContactInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub photo: Option<String>,
}

/// Graph API error envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}
