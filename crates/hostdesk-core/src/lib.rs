// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Hostdesk messaging pipeline.
//!
//! This crate provides the error taxonomy, domain types and the adapter
//! traits implemented by the storage, channel and media backends.

pub mod error;
pub mod job;
pub mod traits;
pub mod types;

pub use error::HostdeskError;
pub use job::{EnqueueOutcome, FailOutcome, Job, JobOptions, JobStatus, QueueCounts};
pub use types::{AdapterType, AgentMessage, HealthStatus};

pub use traits::{
    AgentForwarder, ChannelGateway, EscalationFilter, JobStore, MediaStorage, PluginAdapter,
    StorageAdapter,
};
