// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps a provider message to the stored message type, content and metadata.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::warn;

use hostdesk_core::types::{MediaKind, MessageType};

use crate::webhook::{InboundMessage, MediaBody};

const DEFAULT_MIME: &str = "application/octet-stream";

static FLOW_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^booking_([a-f0-9-]{36})_\d+$").unwrap());
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());
static BR_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());
static AGE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*[-a]\s*(\d+)").unwrap());
static SINGLE_AGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());

/// Media attached to a message that should be downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub media_id: String,
    /// Download type; stickers are stored as images.
    pub kind: MediaKind,
    pub mime_type: String,
}

/// A provider message in storage form.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub message_type: MessageType,
    pub content: String,
    /// Always a JSON object.
    pub metadata: Value,
    pub media: Option<MediaRef>,
}

impl Classified {
    fn text(content: impl Into<String>, metadata: Value) -> Self {
        Self {
            message_type: MessageType::Text,
            content: content.into(),
            metadata,
            media: None,
        }
    }
}

/// Builds an object from `pairs`, leaving out null values.
fn object(pairs: Vec<(&str, Value)>) -> Value {
    let map: Map<String, Value> = pairs
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    Value::Object(map)
}

fn context_of(message: &InboundMessage) -> Value {
    message.context.clone().unwrap_or(Value::Null)
}

fn media(
    message_type: MessageType,
    kind: MediaKind,
    body: &MediaBody,
    metadata: Value,
) -> Classified {
    Classified {
        message_type,
        content: body.id.clone(),
        metadata,
        media: Some(MediaRef {
            media_id: body.id.clone(),
            kind,
            mime_type: body.mime_type.clone().unwrap_or_else(|| DEFAULT_MIME.to_string()),
        }),
    }
}

/// Classifies `message`. Unsupported types become a text placeholder that
/// keeps the raw message in its metadata.
pub fn classify(message: &InboundMessage) -> Classified {
    let context = context_of(message);

    match message.kind.as_str() {
        "text" => {
            if let Some(text) = &message.text {
                return Classified::text(&text.body, object(vec![("context", context)]));
            }
        }
        "image" | "video" => {
            let (body, message_type, kind) = if message.kind == "image" {
                (&message.image, MessageType::Image, MediaKind::Image)
            } else {
                (&message.video, MessageType::Video, MediaKind::Video)
            };
            if let Some(body) = body {
                let metadata = object(vec![
                    ("caption", json!(body.caption)),
                    ("mimeType", json!(body.mime_type)),
                    ("sha256", json!(body.sha256)),
                ]);
                return media(message_type, kind, body, metadata);
            }
        }
        "audio" => {
            if let Some(body) = &message.audio {
                let metadata = object(vec![
                    ("mimeType", json!(body.mime_type)),
                    ("voice", json!(body.voice.unwrap_or(false))),
                ]);
                return media(MessageType::Audio, MediaKind::Audio, body, metadata);
            }
        }
        "document" => {
            if let Some(body) = &message.document {
                let metadata = object(vec![
                    ("filename", json!(body.filename)),
                    ("caption", json!(body.caption)),
                    ("mimeType", json!(body.mime_type)),
                ]);
                return media(MessageType::Document, MediaKind::Document, body, metadata);
            }
        }
        "location" => {
            if let Some(location) = &message.location {
                return Classified {
                    message_type: MessageType::Location,
                    content: json!({
                        "latitude": location.latitude,
                        "longitude": location.longitude,
                    })
                    .to_string(),
                    metadata: object(vec![
                        ("name", json!(location.name)),
                        ("address", json!(location.address)),
                    ]),
                    media: None,
                };
            }
        }
        "button" => {
            if let Some(button) = &message.button {
                if let (Some(payload), Some(text)) = (&button.payload, &button.text) {
                    return Classified::text(
                        text,
                        object(vec![
                            ("button", json!({"id": payload, "title": text})),
                            ("context", context),
                        ]),
                    );
                }
                if let Some(reply) = &button.button_reply {
                    return Classified::text(
                        &reply.title,
                        object(vec![
                            ("button", json!({"id": reply.id, "title": reply.title})),
                            ("context", context),
                        ]),
                    );
                }
            }
        }
        "interactive" => {
            if let Some(interactive) = &message.interactive {
                if let Some(list) = &interactive.list_reply {
                    return Classified::text(
                        &list.title,
                        object(vec![
                            (
                                "list",
                                object(vec![
                                    ("id", json!(list.id)),
                                    ("title", json!(list.title)),
                                    ("description", json!(list.description)),
                                ]),
                            ),
                            ("context", context),
                        ]),
                    );
                }
                if let Some(reply) = &interactive.button_reply {
                    return Classified::text(
                        &reply.title,
                        object(vec![
                            ("button", json!({"id": reply.id, "title": reply.title})),
                            ("context", context),
                        ]),
                    );
                }
                if let Some(flow) = &interactive.nfm_reply {
                    return classify_flow_reply(message, flow, context);
                }
            }
        }
        "contacts" => {
            if let Some(contacts) = &message.contacts {
                let entries: Vec<Value> = contacts
                    .iter()
                    .map(|c| {
                        object(vec![
                            (
                                "name",
                                json!(c.name.as_ref().and_then(|n| n.formatted_name.clone())),
                            ),
                            (
                                "phones",
                                json!(c.phones.iter().filter_map(|p| p.phone.clone()).collect::<Vec<_>>()),
                            ),
                            (
                                "emails",
                                json!(c.emails.iter().filter_map(|e| e.email.clone()).collect::<Vec<_>>()),
                            ),
                        ])
                    })
                    .collect();
                let names = contacts
                    .iter()
                    .map(|c| {
                        c.name
                            .as_ref()
                            .and_then(|n| n.formatted_name.as_deref())
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return Classified::text(
                    format!("[Contato compartilhado: {names}]"),
                    json!({ "contacts": entries }),
                );
            }
        }
        "sticker" => {
            if let Some(body) = &message.sticker {
                let metadata = object(vec![
                    ("mimeType", json!(body.mime_type)),
                    ("animated", json!(body.animated.unwrap_or(false))),
                    ("isSticker", json!(true)),
                ]);
                return media(MessageType::Image, MediaKind::Image, body, metadata);
            }
        }
        _ => {}
    }

    warn!(message_id = %message.id, message_type = %message.kind, "unsupported message type");
    let raw = serde_json::to_value(message).unwrap_or(Value::Null);
    Classified::text(
        format!("[Tipo não suportado: {}]", message.kind),
        json!({ "rawMessage": raw }),
    )
}

fn classify_flow_reply(
    message: &InboundMessage,
    flow: &crate::webhook::FlowReply,
    context: Value,
) -> Classified {
    let response: Value = match serde_json::from_str::<Value>(&flow.response_json) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => json!({}),
        Err(e) => {
            warn!(message_id = %message.id, error = %e, "flow response is not valid JSON");
            json!({})
        }
    };

    let flow_token = context.get("id").and_then(Value::as_str).map(str::to_string);
    let conversation_id = flow_token
        .as_deref()
        .and_then(|token| FLOW_TOKEN.captures(token))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Classified {
        message_type: MessageType::Interactive,
        content: format_flow_response(&response),
        metadata: object(vec![
            ("interactiveType", json!("nfm_reply")),
            (
                "nfmReply",
                object(vec![
                    ("flowName", json!(flow.name)),
                    ("flowToken", json!(flow_token)),
                    ("responseData", response),
                    ("conversationId", json!(conversation_id)),
                ]),
            ),
            ("context", context),
        ]),
        media: None,
    }
}

/// JavaScript-style truthiness of a form value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First truthy value among `keys`.
fn pick<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| data.get(*k))
        .find(|v| is_truthy(v))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Leading integer of a form value, like `parseInt`.
fn leading_int(value: Option<&Value>) -> Option<i64> {
    let text = value_text(value?);
    let digits: String = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
        .map(|(_, c)| c)
        .collect();
    digits.parse().ok()
}

/// Formats a booking form response as
/// `de 10/02/2026 a 13/02/2026, 2 adultos e 1 criança de 4.0 anos`.
///
/// Falls back to the raw JSON when either date cannot be read.
pub fn format_flow_response(data: &Value) -> String {
    let checkin = pick(data, &["checkin", "check_in_date"]).and_then(parse_flow_date);
    let checkout = pick(data, &["checkout", "check_out_date"]).and_then(parse_flow_date);
    let (Some(checkin), Some(checkout)) = (checkin, checkout) else {
        return format!("Orçamento recebido: {data}");
    };

    let has_children = data.get("has_children").and_then(Value::as_str) == Some("sim");
    let total_guests = leading_int(pick(data, &["guests", "adults"])).unwrap_or(0);
    let children = if has_children {
        leading_int(pick(data, &["children_count", "children"])).unwrap_or(0)
    } else {
        0
    };
    let adults = (total_guests - children).max(0);

    let adults_text = if adults == 1 {
        "1 adulto".to_string()
    } else {
        format!("{adults} adultos")
    };

    let children_text = if !has_children || children == 0 {
        "sem crianças".to_string()
    } else {
        let age = data
            .get("children_age")
            .filter(|v| is_truthy(v))
            .map(value_text)
            .and_then(|raw| average_age(&raw))
            .map(|avg| format!(" de {avg} anos"))
            .unwrap_or_default();
        if children == 1 {
            format!("1 criança{age}")
        } else {
            format!("{children} crianças{age}")
        }
    };

    format!("de {checkin} a {checkout}, {adults_text} e {children_text}")
}

/// Reads an ISO date, a `dd/mm/yyyy` date or an epoch (seconds or millis)
/// into `dd/mm/yyyy`. Epochs outside 2020..=2035 are rejected.
fn parse_flow_date(value: &Value) -> Option<String> {
    let raw = value_text(value);
    if let Some(caps) = ISO_DATE.captures(&raw) {
        return Some(format!("{}/{}/{}", &caps[3], &caps[2], &caps[1]));
    }
    if BR_DATE.is_match(&raw) {
        return Some(raw);
    }

    let mut millis = leading_int(Some(value))?;
    if millis > 1_000_000_000 && millis < 1_000_000_000_000 {
        millis *= 1000;
    }
    let date = DateTime::<Utc>::from_timestamp_millis(millis)?;
    if !(2020..=2035).contains(&date.year()) {
        return None;
    }
    Some(date.format("%d/%m/%Y").to_string())
}

/// Midpoint of an age range (`"3-5"` → `"4.0"`), or a single age.
fn average_age(raw: &str) -> Option<String> {
    if let Some(caps) = AGE_RANGE.captures(raw) {
        let min: f64 = caps[1].parse().ok()?;
        let max: f64 = caps[2].parse().ok()?;
        return Some(format!("{:.1}", (min + max) / 2.0));
    }
    SINGLE_AGE.captures(raw).map(|caps| format!("{}.0", &caps[1]))
}
