// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and queue depth gauges.

use std::time::Duration;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hostdesk_bus::sink::EVENTS_DROPPED_TOTAL;
use hostdesk_core::job::QueueCounts;
use hostdesk_pipeline::processors::{
    IA_REACTIVATIONS_TOTAL, MEDIA_BYTES_TOTAL, MESSAGES_TOTAL, SENDS_TOTAL,
};
use hostdesk_queue::recording::{JOB_DURATION_SECONDS, JOBS_TOTAL};
use hostdesk_queue::{JobQueue, QueueName};

pub const QUEUE_JOBS: &str = "hostdesk_queue_jobs";

/// Register all Hostdesk metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(JOBS_TOTAL, "Job attempts by queue and outcome");
    describe_histogram!(JOB_DURATION_SECONDS, "Job processing time in seconds");
    describe_gauge!(QUEUE_JOBS, "Jobs per queue and state");
    describe_counter!(MESSAGES_TOTAL, "Messages stored by direction and type");
    describe_counter!(SENDS_TOTAL, "Outbound sends by outcome");
    describe_counter!(MEDIA_BYTES_TOTAL, "Bytes of media downloaded");
    describe_counter!(IA_REACTIVATIONS_TOTAL, "Follow-up IA locks released");
    describe_counter!(EVENTS_DROPPED_TOTAL, "Real-time events dropped by a full publisher");
}

/// Publishes one queue's counts as `hostdesk_queue_jobs{queue,state}`.
pub fn record_queue_counts(queue: QueueName, counts: &QueueCounts) {
    let states = [
        ("waiting", counts.waiting),
        ("delayed", counts.delayed),
        ("active", counts.active),
        ("completed", counts.completed),
        ("failed", counts.failed),
    ];
    for (state, value) in states {
        metrics::gauge!(QUEUE_JOBS, "queue" => queue.key(), "state" => state).set(value as f64);
    }
}

/// Refreshes the queue gauges on an interval until `cancel` fires.
pub fn spawn_queue_gauges(jobs: JobQueue, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    for queue in QueueName::ALL {
                        match jobs.counts(queue).await {
                            Ok(counts) => record_queue_counts(queue, &counts),
                            Err(e) => tracing::warn!(queue = queue.key(), error = %e, "failed to read queue counts"),
                        }
                    }
                }
            }
        }
        tracing::debug!("queue gauge task stopped");
    })
}
