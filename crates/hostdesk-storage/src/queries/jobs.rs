// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job table backing the worker pools.
//!
//! `claim` selects and leases in one transaction on the single writer, so a
//! job is never handed to two workers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hostdesk_core::HostdeskError;
use hostdesk_core::job::{EnqueueOutcome, FailOutcome, Job, JobOptions, JobStatus, QueueCounts};
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use crate::database::{Database, map_tr_err};
use crate::models::{get_enum, get_json, get_ts, now, ts};

const JOB_COLUMNS: &str = "id, queue, payload, status, attempts, max_attempts, backoff_ms, \
     run_at, dedup_key, last_error, created_at, updated_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        queue: row.get(1)?,
        payload: get_json(row, 2)?,
        status: get_enum(row, 3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        backoff_ms: row.get::<_, i64>(6)?.max(0) as u64,
        run_at: get_ts(row, 7)?,
        dedup_key: row.get(8)?,
        last_error: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

fn chrono_delay(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

pub async fn enqueue(
    db: &Database,
    queue: &str,
    payload: Value,
    options: JobOptions,
) -> Result<EnqueueOutcome, HostdeskError> {
    let queue = queue.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if let Some(key) = options.dedup_key.as_deref() {
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM jobs WHERE queue = ?1 AND dedup_key = ?2 \
                         AND status IN ('pending', 'active')",
                        params![queue, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    tx.commit()?;
                    return Ok(EnqueueOutcome {
                        id,
                        deduplicated: true,
                    });
                }
            }

            let now = now();
            let run_at = match options.delay {
                Some(delay) => now + chrono_delay(delay),
                None => now,
            };
            tx.execute(
                "INSERT INTO jobs (queue, payload, status, attempts, max_attempts, backoff_ms, \
                 run_at, dedup_key, created_at, updated_at) \
                 VALUES (?1, ?2, 'pending', 0, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    queue,
                    payload.to_string(),
                    options.attempts.max(1),
                    options.backoff.as_millis() as i64,
                    ts(&run_at),
                    options.dedup_key,
                    ts(&now),
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(EnqueueOutcome {
                id,
                deduplicated: false,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn claim(
    db: &Database,
    queue: &str,
    lease: Duration,
) -> Result<Option<Job>, HostdeskError> {
    let queue = queue.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now();
            let job = tx
                .query_row(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM jobs \
                         WHERE queue = ?1 AND status = 'pending' AND run_at <= ?2 \
                         ORDER BY run_at ASC, id ASC LIMIT 1"
                    ),
                    params![queue, ts(&now)],
                    job_from_row,
                )
                .optional()?;
            let Some(mut job) = job else {
                return Ok(None);
            };
            job.status = JobStatus::Active;
            job.attempts += 1;
            job.updated_at = now;
            tx.execute(
                "UPDATE jobs SET status = 'active', attempts = ?1, locked_until = ?2, \
                 updated_at = ?3 WHERE id = ?4",
                params![job.attempts, ts(&(now + chrono_delay(lease))), ts(&now), job.id],
            )?;
            tx.commit()?;
            Ok(Some(job))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn complete(db: &Database, job_id: i64) -> Result<(), HostdeskError> {
    db.connection()
        .call(move |conn| {
            let now = ts(&now());
            conn.execute(
                "UPDATE jobs SET status = 'completed', locked_until = NULL, last_error = NULL, \
                 finished_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, job_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn fail(
    db: &Database,
    job_id: i64,
    error: &str,
    retryable: bool,
) -> Result<FailOutcome, HostdeskError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let job = tx
                .query_row(
                    &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                    params![job_id],
                    job_from_row,
                )
                .optional()?;
            let now = now();
            let outcome = match job {
                Some(job) if retryable && job.has_attempts_left() => {
                    let run_at = now + chrono_delay(job.next_backoff());
                    tx.execute(
                        "UPDATE jobs SET status = 'pending', run_at = ?1, last_error = ?2, \
                         locked_until = NULL, updated_at = ?3 WHERE id = ?4",
                        params![ts(&run_at), error, ts(&now), job_id],
                    )?;
                    FailOutcome::Retrying { run_at }
                }
                _ => {
                    tx.execute(
                        "UPDATE jobs SET status = 'failed', last_error = ?1, locked_until = NULL, \
                         finished_at = ?2, updated_at = ?2 WHERE id = ?3",
                        params![error, ts(&now), job_id],
                    )?;
                    FailOutcome::Failed
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn recover_stale(db: &Database, queue: &str) -> Result<u64, HostdeskError> {
    let queue = queue.to_string();
    db.connection()
        .call(move |conn| {
            let now = ts(&now());
            let n = conn.execute(
                "UPDATE jobs SET status = 'pending', locked_until = NULL, updated_at = ?1 \
                 WHERE queue = ?2 AND status = 'active' AND locked_until < ?1",
                params![now, queue],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn counts(db: &Database, queue: &str) -> Result<QueueCounts, HostdeskError> {
    let queue = queue.to_string();
    db.connection()
        .call(move |conn| {
            let now = ts(&now());
            conn.query_row(
                "SELECT \
                   COALESCE(SUM(status = 'pending' AND run_at <= ?2), 0), \
                   COALESCE(SUM(status = 'pending' AND run_at > ?2), 0), \
                   COALESCE(SUM(status = 'active'), 0), \
                   COALESCE(SUM(status = 'completed'), 0), \
                   COALESCE(SUM(status = 'failed'), 0) \
                 FROM jobs WHERE queue = ?1",
                params![queue, now],
                |row| {
                    Ok(QueueCounts {
                        waiting: row.get::<_, i64>(0)? as u64,
                        delayed: row.get::<_, i64>(1)? as u64,
                        active: row.get::<_, i64>(2)? as u64,
                        completed: row.get::<_, i64>(3)? as u64,
                        failed: row.get::<_, i64>(4)? as u64,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn clean(
    db: &Database,
    queue: &str,
    completed_before: DateTime<Utc>,
    failed_before: DateTime<Utc>,
) -> Result<u64, HostdeskError> {
    let queue = queue.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM jobs WHERE queue = ?1 AND ( \
                   (status = 'completed' AND finished_at < ?2) OR \
                   (status = 'failed' AND finished_at < ?3))",
                params![queue, ts(&completed_before), ts(&failed_before)],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}
