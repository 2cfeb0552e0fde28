// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Hostdesk integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockGateway`] - Channel gateway that records sends and serves canned media
//! - [`RecordingSink`] - Event sink that keeps every published event
//! - [`RecordingAgent`] - Agent forwarder that keeps every forwarded message
//! - [`TestHarness`] - Temp SQLite store, job queue and config wired together

pub mod harness;
pub mod mock_agent;
pub mod mock_gateway;
pub mod recording_sink;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_agent::RecordingAgent;
pub use mock_gateway::{MockGateway, SentMessage};
pub use recording_sink::RecordingSink;
