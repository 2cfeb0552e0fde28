// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pools: a fixed number of tasks per queue running a [`Processor`].
//!
//! Each worker claims one job, runs it to completion and only then claims
//! the next, so a queue never has more than `concurrency` jobs in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hostdesk_core::{FailOutcome, HostdeskError, Job};

use crate::recording::{JobOutcome, record_job};
use crate::names::QueueName;
use crate::queue::JobQueue;

/// Delay after a store error before the worker polls again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Handles the jobs of one queue.
///
/// Returning `Ok` acknowledges the job. Errors are retried when
/// [`HostdeskError::is_retryable`] says so and attempts remain.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError>;
}

/// Running workers of one queue.
pub struct WorkerPool {
    queue: QueueName,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Recovers stale leases of `queue` and spawns its workers.
    ///
    /// The pool stops when `parent` is cancelled or [`WorkerPool::shutdown`]
    /// is called.
    pub async fn start(
        jobs: JobQueue,
        queue: QueueName,
        processor: Arc<dyn Processor>,
        parent: &CancellationToken,
    ) -> Result<Self, HostdeskError> {
        jobs.recover_stale(queue).await?;

        let policy = queue.policy(jobs.config()).clone();
        let poll = Duration::from_millis(policy.poll_interval_ms);
        let cancel = parent.child_token();
        let handles = (0..policy.concurrency.max(1))
            .map(|worker| {
                let jobs = jobs.clone();
                let processor = Arc::clone(&processor);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(jobs, queue, processor, cancel, poll, worker).await;
                })
            })
            .collect::<Vec<_>>();

        info!(queue = %queue, concurrency = handles.len(), "worker pool started");
        Ok(Self {
            queue,
            cancel,
            handles,
        })
    }

    pub fn queue(&self) -> QueueName {
        self.queue
    }

    pub fn concurrency(&self) -> usize {
        self.handles.len()
    }

    /// Stops claiming and waits for in-flight jobs to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!(queue = %self.queue, error = %e, "worker task panicked");
            }
        }
        info!(queue = %self.queue, "worker pool stopped");
    }
}

async fn worker_loop(
    jobs: JobQueue,
    queue: QueueName,
    processor: Arc<dyn Processor>,
    cancel: CancellationToken,
    poll: Duration,
    worker: usize,
) {
    debug!(queue = %queue, worker, "worker started");
    while !cancel.is_cancelled() {
        let idle = match jobs.claim(queue).await {
            Ok(Some(job)) => {
                run_job(&jobs, queue, processor.as_ref(), job).await;
                continue;
            }
            Ok(None) => poll,
            Err(e) => {
                warn!(queue = %queue, error = %e, "claim failed");
                ERROR_BACKOFF
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(idle) => {}
        }
    }
    debug!(queue = %queue, worker, "worker stopped");
}

fn tenant_of(job: &Job) -> &str {
    job.payload
        .get("tenantId")
        .and_then(|v| v.as_str())
        .unwrap_or("-")
}

/// Runs one claimed job and records its outcome in the store.
pub async fn run_job(jobs: &JobQueue, queue: QueueName, processor: &dyn Processor, job: Job) {
    let started = Instant::now();
    let result = processor.process(&job).await;
    let elapsed = started.elapsed().as_secs_f64();

    let outcome = match result {
        Ok(()) => match jobs.store().complete(job.id).await {
            Ok(()) => {
                debug!(queue = %queue, job_id = job.id, tenant_id = tenant_of(&job), "job completed");
                JobOutcome::Completed
            }
            Err(e) => {
                // The lease expires and the job is redelivered.
                error!(queue = %queue, job_id = job.id, error = %e, "failed to acknowledge job");
                return;
            }
        },
        Err(err) => {
            let retryable = err.is_retryable();
            match jobs.store().fail(job.id, &err.to_string(), retryable).await {
                Ok(FailOutcome::Retrying { run_at }) => {
                    warn!(
                        queue = %queue,
                        job_id = job.id,
                        tenant_id = tenant_of(&job),
                        attempts = job.attempts,
                        retry_at = %run_at,
                        error = %err,
                        "job failed, will retry"
                    );
                    JobOutcome::Retried
                }
                Ok(FailOutcome::Failed) => {
                    error!(
                        queue = %queue,
                        job_id = job.id,
                        tenant_id = tenant_of(&job),
                        attempts = job.attempts,
                        permanent = !retryable,
                        error = %err,
                        "job failed"
                    );
                    JobOutcome::Failed
                }
                Err(e) => {
                    error!(queue = %queue, job_id = job.id, error = %e, "failed to record job failure");
                    return;
                }
            }
        }
    };
    record_job(queue, outcome, elapsed);
}

/// Periodically deletes finished jobs past their retention window.
pub fn spawn_cleanup(jobs: JobQueue, cancel: CancellationToken) -> JoinHandle<()> {
    let every = Duration::from_secs(jobs.config().cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = jobs.clean_all().await {
                        warn!(error = %e, "job cleanup failed");
                    }
                }
            }
        }
        debug!("job cleanup task stopped");
    })
}
