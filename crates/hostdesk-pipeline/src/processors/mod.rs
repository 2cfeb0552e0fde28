// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One [`hostdesk_queue::Processor`] per queue.
//!
//! Processors re-read current state before mutating and tolerate duplicate,
//! late and out-of-order jobs.

pub mod incoming;
pub mod media;
pub mod outgoing;
pub mod page;
pub mod reactivation;
pub mod status;

pub use incoming::IncomingProcessor;
pub use media::MediaProcessor;
pub use outgoing::{OutboundRequest, OutgoingProcessor, queue_outbound};
pub use page::PageProcessor;
pub use reactivation::ReactivationProcessor;
pub use status::StatusProcessor;

/// Messages persisted by the pipeline, by direction and type.
pub const MESSAGES_TOTAL: &str = "hostdesk_messages_total";

/// Outbound sends, by outcome.
pub const SENDS_TOTAL: &str = "hostdesk_sends_total";

/// Media bytes written to storage.
pub const MEDIA_BYTES_TOTAL: &str = "hostdesk_media_bytes_total";

/// Follow-up locks released by the reactivation job.
pub const IA_REACTIVATIONS_TOTAL: &str = "hostdesk_ia_reactivations_total";
