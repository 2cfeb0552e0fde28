// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of human-attendant requests and hotel-unit selections in
//! inbound messages.

use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use hostdesk_config::model::{EscalationConfig, HotelUnitConfig};

use crate::webhook::InboundMessage;

/// Longer texts are not treated as a request for a person.
pub const MAX_HUMAN_REQUEST_CHARS: usize = 80;

/// Longer texts are not treated as a typed unit name.
pub const MAX_UNIT_TEXT_CHARS: usize = 40;

/// Lowercases, trims and strips accents (NFD without combining marks).
pub fn fold(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Matches short texts against the configured human-request phrases.
#[derive(Debug, Clone)]
pub struct HumanRequestDetector {
    keywords: Vec<String>,
}

impl HumanRequestDetector {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| fold(k))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let folded = fold(text);
        if folded.chars().count() > MAX_HUMAN_REQUEST_CHARS {
            return false;
        }
        self.keywords.iter().any(|k| folded.contains(k.as_str()))
    }

    /// Only text messages can ask for a person.
    pub fn detect(&self, message: &InboundMessage) -> bool {
        message.text_body().is_some_and(|body| self.matches(body))
    }
}

/// Resolves reply ids, reply titles and short texts to a configured hotel
/// unit name.
#[derive(Debug, Clone)]
pub struct HotelUnitMatcher {
    units: Vec<HotelUnitConfig>,
}

impl HotelUnitMatcher {
    pub fn new(units: Vec<HotelUnitConfig>) -> Self {
        Self { units }
    }

    pub fn from_config(config: &EscalationConfig) -> Self {
        Self::new(config.hotel_units.clone())
    }

    /// Tries, in order: exact title, id alias, title containing a unit name,
    /// and a loose id match ignoring `_`, `-` and spaces.
    pub fn match_unit(&self, id: Option<&str>, title: Option<&str>) -> Option<&str> {
        let title = title.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        let id = id.map(|i| i.trim().to_lowercase()).filter(|i| !i.is_empty());

        if let Some(title) = &title
            && let Some(unit) = self.units.iter().find(|u| u.name.to_lowercase() == *title)
        {
            return Some(&unit.name);
        }

        if let Some(id) = &id
            && let Some(unit) = self
                .units
                .iter()
                .find(|u| u.aliases.iter().any(|a| a.to_lowercase() == *id))
        {
            return Some(&unit.name);
        }

        if let Some(title) = &title
            && let Some(unit) = self
                .units
                .iter()
                .find(|u| title.contains(&u.name.to_lowercase()))
        {
            return Some(&unit.name);
        }

        if let Some(id) = &id {
            let spaced = id.replace(['_', '-'], " ");
            let compact = spaced.replace(' ', "");
            if let Some(unit) = self.units.iter().find(|u| {
                let name = u.name.to_lowercase();
                spaced.contains(&name) || name.replace(' ', "").contains(&compact)
            }) {
                return Some(&unit.name);
            }
        }

        None
    }

    /// Unit selected by a list reply, a button reply or a short typed text.
    pub fn detect(&self, message: &InboundMessage) -> Option<&str> {
        let mut candidates: Vec<(&str, Option<&str>, Option<&str>)> = Vec::new();

        if message.kind == "interactive"
            && let Some(interactive) = &message.interactive
        {
            if let Some(list) = &interactive.list_reply {
                candidates.push(("list_reply", Some(list.id.as_str()), Some(list.title.as_str())));
            }
            if let Some(reply) = &interactive.button_reply {
                candidates.push(("interactive_button", Some(reply.id.as_str()), Some(reply.title.as_str())));
            }
        }

        if message.kind == "button"
            && let Some(button) = &message.button
        {
            if let Some(reply) = &button.button_reply {
                candidates.push(("button_reply", Some(reply.id.as_str()), Some(reply.title.as_str())));
            }
            if button.payload.is_some() || button.text.is_some() {
                candidates.push((
                    "template_button",
                    button.payload.as_deref(),
                    button.text.as_deref(),
                ));
            }
        }

        if let Some(body) = message.text_body() {
            let text = body.trim();
            if text.chars().count() <= MAX_UNIT_TEXT_CHARS {
                candidates.push(("text_message", None, Some(text)));
            }
        }

        candidates.into_iter().find_map(|(source, id, title)| {
            let unit = self.match_unit(id, title)?;
            debug!(unit, source, "hotel unit detected");
            Some(unit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matcher() -> HotelUnitMatcher {
        HotelUnitMatcher::from_config(&EscalationConfig::default())
    }

    fn text(body: &str) -> InboundMessage {
        serde_json::from_value(json!({
            "id": "wamid.1", "from": "5511", "timestamp": "1",
            "type": "text", "text": {"body": body}
        }))
        .unwrap()
    }

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("  Falar com ALGUÉM "), "falar com alguem");
        assert_eq!(fold("Santo Antônio"), "santo antonio");
    }

    #[test]
    fn human_request_matches_short_texts() {
        let detector = HumanRequestDetector::new(&EscalationConfig::default().human_request_keywords);
        assert!(detector.matches("Quero falar com alguém"));
        assert!(detector.matches("ATENDENTE por favor"));
        assert!(!detector.matches("Qual o valor da diária?"));

        let long = format!("{} atendente", "a".repeat(80));
        assert!(!detector.matches(&long));
    }

    #[test]
    fn human_request_only_for_text_messages() {
        let detector = HumanRequestDetector::new(&["humano".to_string()]);
        assert!(detector.detect(&text("um humano")));
        let button: InboundMessage = serde_json::from_value(json!({
            "id": "wamid.2", "from": "5511", "timestamp": "1",
            "type": "button", "button": {"payload": "humano", "text": "humano"}
        }))
        .unwrap();
        assert!(!detector.detect(&button));
    }

    #[test]
    fn unit_match_order() {
        let m = matcher();
        assert_eq!(m.match_unit(None, Some("camburi")), Some("Camburi"));
        assert_eq!(m.match_unit(Some("ST"), Some("Opção 5")), Some("Santa Smart Hotel"));
        assert_eq!(
            m.match_unit(None, Some("Quero Campos do Jordão")),
            Some("Campos do Jordão")
        );
        assert_eq!(m.match_unit(Some("unit-ilhabela-01"), None), Some("Ilhabela"));
        assert_eq!(m.match_unit(Some("santo"), None), Some("Santo Antônio do Pinhal"));
        assert_eq!(m.match_unit(Some("paris"), Some("Paris")), None);
        assert_eq!(m.match_unit(None, None), None);
    }

    #[test]
    fn detect_from_replies_and_text() {
        let m = matcher();
        let list: InboundMessage = serde_json::from_value(json!({
            "id": "wamid.3", "from": "5511", "timestamp": "1",
            "type": "interactive",
            "interactive": {"type": "list_reply", "list_reply": {"id": "ilha_bela", "title": "Opção 1"}}
        }))
        .unwrap();
        assert_eq!(m.detect(&list), Some("Ilhabela"));

        let template: InboundMessage = serde_json::from_value(json!({
            "id": "wamid.4", "from": "5511", "timestamp": "1",
            "type": "button", "button": {"payload": "camburi", "text": "Ver"}
        }))
        .unwrap();
        assert_eq!(m.detect(&template), Some("Camburi"));

        assert_eq!(m.detect(&text("Camburi")), Some("Camburi"));
        let long = "Estive em Camburi no ano passado e gostaria de voltar com a família";
        assert_eq!(m.detect(&text(long)), None);
    }
}
