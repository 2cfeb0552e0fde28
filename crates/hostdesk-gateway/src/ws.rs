// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket room subscriptions.
//!
//! Clients connect with `GET /ws?tenant=<id>&rooms=<room>,<room>` and may
//! change their subscriptions afterwards.
//!
//! Client -> Server (JSON):
//! ```json
//! {"action": "join", "room": "tenant:hotel-a:unit:camburi"}
//! {"action": "leave", "room": "conversation:7b1c..."}
//! ```
//!
//! Server -> Client (JSON): every envelope published to a joined room,
//! plus acknowledgements:
//! ```json
//! {"room": "tenant:hotel-a:admins", "event": "message:new", "data": {...}}
//! {"type": "joined", "room": "..."}
//! {"type": "error", "message": "..."}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use hostdesk_bus::{Envelope, Room};
use hostdesk_core::{HostdeskError, StorageAdapter};

use crate::handlers::error_response;
use crate::server::GatewayState;

const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub tenant: String,
    /// Comma-separated rooms to join on connect.
    #[serde(default)]
    pub rooms: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Join,
    Leave,
}

/// WebSocket message from client.
#[derive(Debug, Deserialize)]
struct WsIncoming {
    action: Action,
    room: String,
}

/// Acknowledgements sent back to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsReply<'a> {
    Joined { room: &'a str },
    Left { room: &'a str },
    Error { message: String },
}

/// Resolves a room name for a client of `tenant_id`.
///
/// Tenant rooms must belong to the tenant; conversation rooms must name a
/// conversation the tenant owns.
pub async fn authorize_room(
    store: &dyn StorageAdapter,
    tenant_id: &str,
    raw: &str,
) -> Result<Room, HostdeskError> {
    let room = Room::parse(raw).ok_or_else(|| HostdeskError::BadRequest(format!("unknown room {raw}")))?;
    if let Room::Conversation(id) = &room {
        store.get_conversation(tenant_id, id).await?;
    } else if room.tenant_id() != Some(tenant_id) {
        return Err(HostdeskError::Forbidden(format!("room {raw} belongs to another tenant")));
    }
    Ok(room)
}

/// Forwards one room's envelopes as JSON text until the room or the
/// connection goes away.
pub fn forward_room(
    mut rx: broadcast::Receiver<Arc<Envelope>>,
    tx: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    let text = match serde_json::to_string(envelope.as_ref()) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize envelope");
                            continue;
                        }
                    };
                    if tx.send(text).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket client lagging, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// WebSocket upgrade handler.
///
/// Initial rooms are authorized before the upgrade so a bad request gets a
/// plain HTTP error.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(query): Query<WsQuery>,
) -> Response {
    if query.tenant.is_empty() {
        return error_response(&HostdeskError::BadRequest("missing tenant".into()));
    }

    let mut initial = Vec::new();
    let requested = query.rooms.as_deref().unwrap_or_default();
    for raw in requested.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        match authorize_room(state.store.as_ref(), &query.tenant, raw).await {
            Ok(room) => initial.push(room),
            Err(e) => {
                tracing::warn!(tenant_id = %query.tenant, room = raw, error = %e, "websocket room rejected");
                return error_response(&e);
            }
        }
    }

    let tenant_id = query.tenant;
    ws.on_upgrade(move |socket| handle_socket(socket, state, tenant_id, initial))
        .into_response()
}

struct Subscriptions {
    tasks: HashMap<String, JoinHandle<()>>,
    tx: mpsc::Sender<String>,
}

impl Subscriptions {
    fn join(&mut self, state: &GatewayState, room: &Room) {
        let key = room.to_string();
        if self.tasks.contains_key(&key) {
            return;
        }
        let handle = forward_room(state.hub.subscribe(room), self.tx.clone());
        self.tasks.insert(key, handle);
    }

    fn leave(&mut self, room: &str) -> bool {
        match self.tasks.remove(room) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

async fn reply(tx: &mpsc::Sender<String>, reply: WsReply<'_>) {
    if let Ok(text) = serde_json::to_string(&reply) {
        let _ = tx.send(text).await;
    }
}

/// Handle an individual WebSocket connection.
///
/// A sender task drains the outbound channel into the socket; each joined
/// room has its own forwarding task feeding that channel.
async fn handle_socket(socket: WebSocket, state: GatewayState, tenant_id: String, initial: Vec<Room>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let sender_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut subs = Subscriptions {
        tasks: HashMap::new(),
        tx: tx.clone(),
    };
    for room in &initial {
        subs.join(&state, room);
    }
    tracing::debug!(tenant_id = %tenant_id, rooms = initial.len(), "websocket connected");

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let incoming: WsIncoming = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("invalid WebSocket message: {e}");
                        let message = format!("invalid message: {e}");
                        reply(&tx, WsReply::Error { message }).await;
                        continue;
                    }
                };
                match incoming.action {
                    Action::Join => match authorize_room(state.store.as_ref(), &tenant_id, &incoming.room).await {
                        Ok(room) => {
                            subs.join(&state, &room);
                            reply(&tx, WsReply::Joined { room: &incoming.room }).await;
                        }
                        Err(e) => {
                            tracing::warn!(tenant_id = %tenant_id, room = %incoming.room, error = %e, "websocket join rejected");
                            reply(&tx, WsReply::Error { message: e.to_string() }).await;
                        }
                    },
                    Action::Leave => {
                        subs.leave(&incoming.room);
                        reply(&tx, WsReply::Left { room: &incoming.room }).await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {} // Binary is unused; pings are answered by axum.
        }
    }

    subs.clear();
    sender_task.abort();
    tracing::debug!(tenant_id = %tenant_id, "websocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hostdesk_bus::{RealtimeEvent, RoomHub};
    use hostdesk_test_utils::TestHarness;
    use serde_json::json;

    const TENANT: &str = TestHarness::TENANT_ID;

    #[test]
    fn ws_incoming_deserializes() {
        let msg: WsIncoming = serde_json::from_str(r#"{"action": "join", "room": "tenant:t1:admins"}"#).unwrap();
        assert_eq!(msg.action, Action::Join);
        assert_eq!(msg.room, "tenant:t1:admins");
        assert!(serde_json::from_str::<WsIncoming>(r#"{"action": "shout", "room": "x"}"#).is_err());
    }

    #[test]
    fn reply_is_tagged() {
        let json = serde_json::to_value(WsReply::Joined { room: "tenant:t1:admins" }).unwrap();
        assert_eq!(json, json!({"type": "joined", "room": "tenant:t1:admins"}));
    }

    #[tokio::test]
    async fn tenant_rooms_are_scoped() {
        let harness = TestHarness::builder().build().await.unwrap();
        let store = harness.store.as_ref();

        let admins = authorize_room(store, TENANT, &format!("tenant:{TENANT}:admins")).await.unwrap();
        assert_eq!(admins, Room::TenantAdmins(TENANT.into()));
        let unit = authorize_room(store, TENANT, &format!("tenant:{TENANT}:unit:camburi")).await.unwrap();
        assert_eq!(unit.tenant_id(), Some(TENANT));

        let err = authorize_room(store, TENANT, "tenant:hotel-other:admins").await.unwrap_err();
        assert!(matches!(err, HostdeskError::Forbidden(_)));
        let err = authorize_room(store, TENANT, "lobby").await.unwrap_err();
        assert!(matches!(err, HostdeskError::BadRequest(_)));
        harness.close().await;
    }

    #[tokio::test]
    async fn conversation_rooms_require_ownership() {
        let harness = TestHarness::builder().build().await.unwrap();
        let store = harness.store.as_ref();
        let contact = store.find_or_create_contact(TENANT, "5511987654321", None).await.unwrap();
        let (conversation, _) = store.find_or_create_active_conversation(TENANT, &contact.id).await.unwrap();

        let room = authorize_room(store, TENANT, &format!("conversation:{}", conversation.id))
            .await
            .unwrap();
        assert_eq!(room, Room::Conversation(conversation.id.clone()));

        let err = authorize_room(store, "hotel-other", &format!("conversation:{}", conversation.id))
            .await
            .unwrap_err();
        assert!(matches!(err, HostdeskError::NotFound { .. }));
        harness.close().await;
    }

    #[tokio::test]
    async fn forwarder_relays_room_envelopes() {
        let hub = RoomHub::new(8);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = forward_room(hub.subscribe(&Room::TenantAdmins("t1".into())), tx);

        hub.deliver(&RealtimeEvent::ConversationUpdated {
            tenant_id: "t1".into(),
            conversation_id: "c1".into(),
            hotel_unit: None,
            updates: json!({"status": "WAITING"}),
        });

        let text = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["room"], "tenant:t1:admins");
        assert_eq!(value["event"], "conversation:updated");
        assert_eq!(value["data"]["conversationId"], "c1");
        handle.abort();
    }
}
