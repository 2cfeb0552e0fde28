// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and WebSocket gateway for Hostdesk.
//!
//! Receives WhatsApp webhooks and hands them to the dispatcher, lets
//! attendant clients subscribe to real-time rooms over WebSocket, and
//! exposes health and Prometheus metrics.

pub mod handlers;
pub mod server;
pub mod ws;

#[cfg(test)]
mod testing;

pub use server::{GatewayState, HealthState, router, start_server};
