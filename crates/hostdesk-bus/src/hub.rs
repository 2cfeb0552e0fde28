// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room fan-out for connected clients.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::events::{Envelope, RealtimeEvent, Room};

/// Per-room broadcast channels, created on first subscription.
pub struct RoomHub {
    rooms: DashMap<String, broadcast::Sender<Arc<Envelope>>>,
    room_capacity: usize,
}

impl RoomHub {
    pub fn new(room_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            room_capacity: room_capacity.max(1),
        }
    }

    pub fn subscribe(&self, room: &Room) -> broadcast::Receiver<Arc<Envelope>> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.room_capacity).0)
            .subscribe()
    }

    /// Number of rooms with a live channel.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Delivers every envelope of `event` to its room. Returns the number of
    /// envelopes that reached at least one subscriber.
    pub fn deliver(&self, event: &RealtimeEvent) -> usize {
        let mut delivered = 0;
        for envelope in event.envelopes() {
            let room = envelope.room.clone();
            let Some(sender) = self.rooms.get(&room).map(|s| s.clone()) else {
                continue;
            };
            if sender.send(Arc::new(envelope)).is_ok() {
                delivered += 1;
            } else {
                // Every subscriber left.
                self.rooms.remove_if(&room, |_, s| s.receiver_count() == 0);
            }
        }
        trace!(event = event.name(), delivered, "event delivered");
        delivered
    }

    /// Drains `rx` until it closes or `cancel` fires.
    pub fn spawn(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<RealtimeEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => {
                            self.deliver(&event);
                        }
                        None => break,
                    },
                }
            }
            debug!("room hub stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{EventSink, channel};
    use serde_json::json;
    use std::time::Duration;

    fn updated(conversation: &str) -> RealtimeEvent {
        RealtimeEvent::ConversationUpdated {
            tenant_id: "t1".into(),
            conversation_id: conversation.into(),
            hotel_unit: None,
            updates: json!({"iaLocked": false}),
        }
    }

    #[test]
    fn subscribers_only_see_their_rooms() {
        let hub = RoomHub::new(8);
        let mut admins = hub.subscribe(&Room::TenantAdmins("t1".into()));
        let mut other = hub.subscribe(&Room::TenantAdmins("t2".into()));

        assert_eq!(hub.deliver(&updated("c1")), 1);
        let envelope = admins.try_recv().unwrap();
        assert_eq!(envelope.event, "conversation:updated");
        assert_eq!(envelope.data["conversationId"], "c1");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn abandoned_rooms_are_pruned() {
        let hub = RoomHub::new(8);
        let rx = hub.subscribe(&Room::Conversation("c1".into()));
        assert_eq!(hub.room_count(), 1);
        drop(rx);
        assert_eq!(hub.deliver(&updated("c1")), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn spawned_hub_forwards_published_events() {
        let hub = Arc::new(RoomHub::new(8));
        let mut rx = hub.subscribe(&Room::Conversation("c9".into()));
        let (publisher, events) = channel(16);
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&hub).spawn(events, cancel.clone());

        publisher.publish(updated("c9"));
        let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.room, "conversation:c9");

        cancel.cancel();
        handle.await.unwrap();
    }
}
