// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hostdesk queues` command implementation.
//!
//! Reads and maintains the durable job table directly, so it works whether
//! or not a server is running against the same database.

use std::sync::Arc;

use hostdesk_config::HostdeskConfig;
use hostdesk_core::{HostdeskError, QueueCounts, StorageAdapter};
use hostdesk_queue::{JobQueue, QueueName};
use hostdesk_storage::SqliteStorage;

async fn open(config: &HostdeskConfig) -> Result<(Arc<SqliteStorage>, JobQueue), HostdeskError> {
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let jobs = JobQueue::new(storage.clone(), config.queues.clone());
    Ok((storage, jobs))
}

pub async fn collect_counts(jobs: &JobQueue) -> Result<Vec<(QueueName, QueueCounts)>, HostdeskError> {
    let mut rows = Vec::with_capacity(QueueName::ALL.len());
    for queue in QueueName::ALL {
        rows.push((queue, jobs.counts(queue).await?));
    }
    Ok(rows)
}

pub fn render_table(rows: &[(QueueName, QueueCounts)]) -> String {
    let mut out = format!(
        "{:<18}{:>9}{:>9}{:>9}{:>11}{:>9}\n",
        "QUEUE", "WAITING", "DELAYED", "ACTIVE", "COMPLETED", "FAILED"
    );
    for (queue, c) in rows {
        out.push_str(&format!(
            "{:<18}{:>9}{:>9}{:>9}{:>11}{:>9}\n",
            queue.key(),
            c.waiting,
            c.delayed,
            c.active,
            c.completed,
            c.failed
        ));
    }
    out
}

/// `hostdesk queues stats [--json]`
pub async fn run_stats(config: &HostdeskConfig, json: bool) -> Result<(), HostdeskError> {
    let (storage, jobs) = open(config).await?;
    let rows = collect_counts(&jobs).await;
    storage.close().await?;
    let rows = rows?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(queue, counts)| Ok((queue.key().to_string(), serde_json::to_value(counts)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::Value::Object(map));
    } else {
        print!("{}", render_table(&rows));
    }
    Ok(())
}

/// `hostdesk queues clean [queue]`
pub async fn run_clean(config: &HostdeskConfig, queue: Option<&str>) -> Result<(), HostdeskError> {
    let target = match queue {
        Some(raw) => Some(
            QueueName::lookup(raw).ok_or_else(|| HostdeskError::BadRequest(format!("unknown queue {raw}")))?,
        ),
        None => None,
    };

    let (storage, jobs) = open(config).await?;
    let removed = match target {
        Some(queue) => jobs.clean(queue).await,
        None => jobs.clean_all().await,
    };
    storage.close().await?;
    println!("removed {} finished job(s)", removed?);
    Ok(())
}
