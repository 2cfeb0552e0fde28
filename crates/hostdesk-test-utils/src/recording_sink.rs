// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sink that records everything published to it.

use std::sync::Mutex;

use hostdesk_bus::{EventSink, RealtimeEvent};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RealtimeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RealtimeEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event names in publication order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(RealtimeEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: RealtimeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_in_order() {
        let sink = RecordingSink::new();
        sink.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: "t1".into(),
            conversation_id: "c1".into(),
            hotel_unit: None,
            updates: json!({"status": "OPEN"}),
        });
        assert_eq!(sink.names(), vec!["conversation:updated"]);
        assert_eq!(sink.count("conversation:updated"), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
