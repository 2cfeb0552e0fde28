// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::HostdeskError;

/// Default number of attempts before a job is marked failed.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default base delay for exponential retry backoff.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to run, possibly delayed until `run_at`.
    Pending,
    /// Leased by a worker.
    Active,
    Completed,
    Failed,
}

/// A queued unit of work as persisted by a [`crate::traits::JobStore`].
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub queue: String,
    pub payload: Value,
    pub status: JobStatus,
    /// Attempts started so far, including the current one once claimed.
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub run_at: DateTime<Utc>,
    pub dedup_key: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Decodes the payload into its typed form.
    ///
    /// A payload that does not match is a permanent failure, so the error is
    /// reported as [`HostdeskError::BadRequest`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, HostdeskError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            HostdeskError::BadRequest(format!("job {} on {}: {e}", self.id, self.queue))
        })
    }

    /// Whether another attempt is allowed after the current one fails.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Delay before the next attempt: `backoff * 2^(attempts - 1)`.
    pub fn next_backoff(&self) -> Duration {
        let exp = self.attempts.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << exp))
    }
}

/// Per-enqueue options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    pub delay: Option<Duration>,
    pub attempts: u32,
    pub backoff: Duration,
    /// Jobs sharing a dedup key within a queue are enqueued at most once.
    pub dedup_key: Option<String>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            delay: None,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            dedup_key: None,
        }
    }
}

impl JobOptions {
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub id: i64,
    /// `true` when an existing job with the same dedup key was returned.
    pub deduplicated: bool,
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying { run_at: DateTime<Utc> },
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn job(attempts: u32, max_attempts: u32) -> Job {
        let now = Utc::now();
        Job {
            id: 7,
            queue: "whatsapp:incoming:message".into(),
            payload: serde_json::json!({"tenantId": "t1"}),
            status: JobStatus::Active,
            attempts,
            max_attempts,
            backoff_ms: 2000,
            run_at: now,
            dedup_key: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(job(1, 3).next_backoff(), Duration::from_secs(2));
        assert_eq!(job(2, 3).next_backoff(), Duration::from_secs(4));
        assert_eq!(job(3, 3).next_backoff(), Duration::from_secs(8));
    }

    #[test]
    fn attempts_left() {
        assert!(job(1, 3).has_attempts_left());
        assert!(!job(3, 3).has_attempts_left());
    }

    #[test]
    fn decode_mismatch_is_bad_request() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            missing_field: String,
        }
        let err = job(1, 3).decode::<Needs>().unwrap_err();
        assert!(matches!(err, HostdeskError::BadRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn options_builder() {
        let opts = JobOptions::default()
            .with_dedup_key("msg-1")
            .with_retry(0, Duration::from_secs(5));
        assert_eq!(opts.attempts, 1);
        assert_eq!(opts.backoff, Duration::from_secs(5));
        assert_eq!(opts.dedup_key.as_deref(), Some("msg-1"));
    }
}
