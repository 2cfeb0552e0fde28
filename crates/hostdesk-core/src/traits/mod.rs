// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod agent;
pub mod channel;
pub mod media;
pub mod queue;
pub mod storage;

pub use adapter::PluginAdapter;
pub use agent::AgentForwarder;
pub use channel::ChannelGateway;
pub use media::MediaStorage;
pub use queue::JobStore;
pub use storage::{EscalationFilter, StorageAdapter};
