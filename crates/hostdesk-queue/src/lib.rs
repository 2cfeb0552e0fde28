// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue runtime for the Hostdesk pipeline.
//!
//! Jobs live in a durable [`hostdesk_core::JobStore`]. [`JobQueue`] adds
//! typed enqueueing, per-queue retry defaults and pause state on top of it,
//! and [`WorkerPool`] runs a [`Processor`] with bounded concurrency.

pub mod recording;
pub mod names;
pub mod queue;
pub mod worker;

pub use names::QueueName;
pub use queue::JobQueue;
pub use worker::{Processor, WorkerPool, spawn_cleanup};
