// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time event bus for the Hostdesk pipeline.
//!
//! Workers publish [`RealtimeEvent`]s through an [`EventSink`]. The
//! production sink is an [`EventPublisher`] feeding a bounded channel that a
//! [`RoomHub`] drains and fans out to per-room subscribers.

pub mod events;
pub mod hub;
pub mod sink;

pub use events::{Envelope, RealtimeEvent, Room};
pub use hub::RoomHub;
pub use sink::{EventPublisher, EventSink, channel};

use std::sync::Arc;

use hostdesk_config::model::BusConfig;

/// Builds the publisher/hub pair from configuration.
pub fn from_config(
    config: &BusConfig,
) -> (
    EventPublisher,
    tokio::sync::mpsc::Receiver<RealtimeEvent>,
    Arc<RoomHub>,
) {
    let (publisher, rx) = channel(config.publisher_capacity);
    (publisher, rx, Arc::new(RoomHub::new(config.room_capacity)))
}
