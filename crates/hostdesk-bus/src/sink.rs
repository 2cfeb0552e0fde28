// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-blocking event publication.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::RealtimeEvent;

pub const EVENTS_DROPPED_TOTAL: &str = "hostdesk_events_dropped_total";

/// Destination for real-time events.
///
/// `publish` never blocks and never fails: a slow or absent bus must not
/// stall a worker.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: RealtimeEvent);
}

/// Sink that pushes events into a bounded channel drained by a
/// [`crate::RoomHub`]. Events that do not fit are dropped.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<RealtimeEvent>,
}

impl EventPublisher {
    pub fn new(tx: mpsc::Sender<RealtimeEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for EventPublisher {
    fn publish(&self, event: RealtimeEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                metrics::counter!(EVENTS_DROPPED_TOTAL, "event" => event.name()).increment(1);
                warn!(
                    event = event.name(),
                    tenant_id = event.tenant_id(),
                    conversation_id = event.conversation_id(),
                    "event bus full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(event = event.name(), "event bus closed, dropping event");
            }
        }
    }
}

/// Creates a publisher and the receiving end for a hub.
pub fn channel(capacity: usize) -> (EventPublisher, mpsc::Receiver<RealtimeEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventPublisher::new(tx), rx)
}
