// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job storage behind the worker pools.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::HostdeskError;
use crate::job::{EnqueueOutcome, FailOutcome, Job, JobOptions, QueueCounts};

/// Persistence for named job queues.
///
/// Implementations must make `claim` exclusive: a job is handed to at most one
/// worker until it is completed, failed, or its lease expires.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Adds a job. When `options.dedup_key` matches a pending or active job
    /// of the same queue, the existing id is returned instead.
    async fn enqueue(
        &self,
        queue: &str,
        payload: Value,
        options: JobOptions,
    ) -> Result<EnqueueOutcome, HostdeskError>;

    /// Leases the oldest due job of `queue` for `lease`, incrementing its
    /// attempt counter.
    async fn claim(&self, queue: &str, lease: Duration) -> Result<Option<Job>, HostdeskError>;

    async fn complete(&self, job_id: i64) -> Result<(), HostdeskError>;

    /// Records a failed attempt. Retryable failures with attempts left are
    /// rescheduled with exponential backoff.
    async fn fail(
        &self,
        job_id: i64,
        error: &str,
        retryable: bool,
    ) -> Result<FailOutcome, HostdeskError>;

    /// Returns active jobs of `queue` whose lease expired to pending.
    async fn recover_stale(&self, queue: &str) -> Result<u64, HostdeskError>;

    async fn counts(&self, queue: &str) -> Result<QueueCounts, HostdeskError>;

    /// Removes completed jobs finished before `completed_before` and failed
    /// jobs finished before `failed_before`.
    async fn clean(
        &self,
        queue: &str,
        completed_before: DateTime<Utc>,
        failed_before: DateTime<Utc>,
    ) -> Result<u64, HostdeskError>;
}
