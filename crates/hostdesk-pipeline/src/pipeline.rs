// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires one worker pool per queue to its processor, plus the background
//! cleanup tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hostdesk_config::model::PageChannel;
use hostdesk_core::HostdeskError;
use hostdesk_queue::{Processor, QueueName, WorkerPool, spawn_cleanup};

use crate::context::PipelineContext;
use crate::media_store::FsMediaStorage;
use crate::processors::{
    IncomingProcessor, MediaProcessor, OutgoingProcessor, PageProcessor, ReactivationProcessor,
    StatusProcessor,
};

const MEDIA_PURGE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn processor_for(queue: QueueName, ctx: &PipelineContext) -> Arc<dyn Processor> {
    match queue {
        QueueName::Incoming => Arc::new(IncomingProcessor::new(ctx.clone())),
        QueueName::Status => Arc::new(StatusProcessor::new(ctx.clone())),
        QueueName::Outgoing => Arc::new(OutgoingProcessor::new(ctx.clone())),
        QueueName::Media => Arc::new(MediaProcessor::new(ctx.clone())),
        QueueName::IaReactivation => Arc::new(ReactivationProcessor::new(ctx.clone())),
        QueueName::Messenger => Arc::new(PageProcessor::new(ctx.clone(), PageChannel::Messenger)),
        QueueName::Instagram => Arc::new(PageProcessor::new(ctx.clone(), PageChannel::Instagram)),
    }
}

/// Running pipeline: all worker pools and background tasks.
pub struct Pipeline {
    pools: Vec<WorkerPool>,
    background: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Starts every queue's workers and the job cleanup task. When
    /// `media_purge` is given, expired media files are purged once a day.
    pub async fn start(
        ctx: PipelineContext,
        media_purge: Option<Arc<FsMediaStorage>>,
        parent: &CancellationToken,
    ) -> Result<Self, HostdeskError> {
        let cancel = parent.child_token();
        let mut pools = Vec::with_capacity(QueueName::ALL.len());
        for queue in QueueName::ALL {
            let pool = WorkerPool::start(ctx.jobs.clone(), queue, processor_for(queue, &ctx), &cancel).await?;
            pools.push(pool);
        }

        let mut background = vec![spawn_cleanup(ctx.jobs.clone(), cancel.clone())];
        if let Some(media) = media_purge {
            background.push(spawn_media_purge(media, MEDIA_PURGE_INTERVAL, cancel.clone()));
        }

        info!(
            pools = pools.len(),
            workers = pools.iter().map(WorkerPool::concurrency).sum::<usize>(),
            "pipeline started"
        );
        Ok(Self {
            pools,
            background,
            cancel,
        })
    }

    pub fn pools(&self) -> &[WorkerPool] {
        &self.pools
    }

    /// Stops claiming new jobs and waits for in-flight ones.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        futures::future::join_all(self.pools.into_iter().map(WorkerPool::shutdown)).await;
        for handle in self.background {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task panicked");
            }
        }
        info!("pipeline stopped");
    }
}

/// Runs [`FsMediaStorage::purge_expired`] on an interval, starting now.
pub fn spawn_media_purge(
    media: Arc<FsMediaStorage>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = media.purge_expired().await {
                        warn!(error = %e, "media cleanup failed");
                    }
                }
            }
        }
        debug!("media cleanup task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use hostdesk_test_utils::TestHarness;

    use crate::testing::{CUSTOMER_PHONE, context, incoming_job, text};

    #[tokio::test]
    async fn queued_message_is_processed_by_workers() {
        let harness = TestHarness::builder().build().await.unwrap();
        let ctx = context(&harness);
        let cancel = CancellationToken::new();
        let pipeline = Pipeline::start(ctx, None, &cancel).await.unwrap();
        assert_eq!(pipeline.pools().len(), QueueName::ALL.len());

        let job = incoming_job(text("wamid.P1", "Olá"));
        let options = harness.jobs.options(QueueName::Incoming).with_dedup_key(job.dedup_key());
        harness.jobs.enqueue(QueueName::Incoming, &job, options).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let counts = harness.jobs.counts(QueueName::Incoming).await.unwrap();
            if counts.completed == 1 {
                break;
            }
            assert!(Instant::now() < deadline, "job not completed: {counts:?}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        pipeline.shutdown().await;
        let contact = harness
            .store
            .find_contact_by_phone(TestHarness::TENANT_ID, CUSTOMER_PHONE)
            .await
            .unwrap();
        assert!(contact.is_some());
        assert_eq!(harness.events.count("message:new"), 1);
        harness.close().await;
    }

    #[tokio::test]
    async fn media_purge_runs_on_start() {
        let harness = TestHarness::builder()
            .with_media_retention_days(0)
            .build()
            .await
            .unwrap();
        let media = Arc::new(FsMediaStorage::new(&harness.config.media));
        hostdesk_core::MediaStorage::save(media.as_ref(), "hotel-test", "image", "image/png", b"png")
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_media_purge(media.clone(), Duration::from_secs(3600), cancel.clone());
        let deadline = Instant::now() + Duration::from_secs(5);
        while harness.media_dir.join("hotel-test").exists() {
            assert!(Instant::now() < deadline, "media was not purged");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        handle.await.unwrap();
        harness.close().await;
    }
}
