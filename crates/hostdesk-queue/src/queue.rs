// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed front end over a [`JobStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use hostdesk_config::model::QueuesConfig;
use hostdesk_core::{EnqueueOutcome, HostdeskError, Job, JobOptions, JobStore, QueueCounts};

use crate::names::QueueName;

/// Handle to the named queues. Cheap to clone; clones share pause state.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    config: Arc<QueuesConfig>,
    paused: Arc<DashSet<QueueName>>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, config: QueuesConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            paused: Arc::new(DashSet::new()),
        }
    }

    pub fn config(&self) -> &QueuesConfig {
        &self.config
    }

    /// Default options of a queue: its configured attempts and backoff.
    pub fn options(&self, queue: QueueName) -> JobOptions {
        let policy = queue.policy(&self.config);
        JobOptions::default().with_retry(policy.attempts, Duration::from_millis(policy.backoff_ms))
    }

    pub async fn enqueue<T: Serialize>(
        &self,
        queue: QueueName,
        payload: &T,
        options: JobOptions,
    ) -> Result<EnqueueOutcome, HostdeskError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| HostdeskError::Queue(format!("encode payload for {queue}: {e}")))?;
        let dedup_key = options.dedup_key.clone();
        let outcome = self.store.enqueue(&queue.to_string(), payload, options).await?;
        if outcome.deduplicated {
            debug!(queue = %queue, job_id = outcome.id, dedup_key = ?dedup_key, "job already queued");
        } else {
            debug!(queue = %queue, job_id = outcome.id, "job enqueued");
        }
        Ok(outcome)
    }

    /// Leases the next due job, or `None` when the queue is empty or paused.
    pub async fn claim(&self, queue: QueueName) -> Result<Option<Job>, HostdeskError> {
        if self.is_paused(queue) {
            return Ok(None);
        }
        let lease = Duration::from_secs(self.config.lock_timeout_secs);
        self.store.claim(&queue.to_string(), lease).await
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn counts(&self, queue: QueueName) -> Result<QueueCounts, HostdeskError> {
        self.store.counts(&queue.to_string()).await
    }

    /// Stops workers of `queue` from claiming new jobs. Running jobs finish.
    pub fn pause(&self, queue: QueueName) {
        if self.paused.insert(queue) {
            warn!(queue = %queue, "queue paused");
        }
    }

    pub fn resume(&self, queue: QueueName) {
        if self.paused.remove(&queue).is_some() {
            info!(queue = %queue, "queue resumed");
        }
    }

    pub fn pause_all(&self) {
        QueueName::ALL.into_iter().for_each(|q| self.pause(q));
    }

    pub fn resume_all(&self) {
        QueueName::ALL.into_iter().for_each(|q| self.resume(q));
    }

    pub fn is_paused(&self, queue: QueueName) -> bool {
        self.paused.contains(&queue)
    }

    pub async fn recover_stale(&self, queue: QueueName) -> Result<u64, HostdeskError> {
        let recovered = self.store.recover_stale(&queue.to_string()).await?;
        if recovered > 0 {
            warn!(queue = %queue, recovered, "recovered jobs with expired lease");
        }
        Ok(recovered)
    }

    /// Deletes finished jobs past their retention window.
    pub async fn clean(&self, queue: QueueName) -> Result<u64, HostdeskError> {
        let now = Utc::now();
        let completed_before =
            now - chrono::Duration::hours(self.config.completed_retention_hours as i64);
        let failed_before = now - chrono::Duration::days(self.config.failed_retention_days as i64);
        let removed = self
            .store
            .clean(&queue.to_string(), completed_before, failed_before)
            .await?;
        info!(queue = %queue, removed, "cleaned old jobs");
        Ok(removed)
    }

    pub async fn clean_all(&self) -> Result<u64, HostdeskError> {
        let mut total = 0;
        for queue in QueueName::ALL {
            total += self.clean(queue).await?;
        }
        Ok(total)
    }
}
