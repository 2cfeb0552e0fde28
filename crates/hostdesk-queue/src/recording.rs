// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job metrics recorded through the metrics facade.

use crate::names::QueueName;

pub const JOBS_TOTAL: &str = "hostdesk_jobs_total";
pub const JOB_DURATION_SECONDS: &str = "hostdesk_job_duration_seconds";

/// Terminal or intermediate result of one job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Retried,
    Failed,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Retried => "retried",
            Self::Failed => "failed",
        }
    }
}

pub fn record_job(queue: QueueName, outcome: JobOutcome, seconds: f64) {
    metrics::counter!(JOBS_TOTAL, "queue" => queue.key(), "outcome" => outcome.as_str())
        .increment(1);
    metrics::histogram!(JOB_DURATION_SECONDS, "queue" => queue.key()).record(seconds);
}
