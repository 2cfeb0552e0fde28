// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downloads inbound media from the provider into local storage.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use hostdesk_core::types::MessagePatch;
use hostdesk_core::{HostdeskError, Job};
use hostdesk_queue::Processor;

use crate::context::PipelineContext;
use crate::media_store::clean_mime;
use crate::payloads::MediaDownloadJob;
use crate::processors::MEDIA_BYTES_TOTAL;

pub struct MediaProcessor {
    ctx: PipelineContext,
}

impl MediaProcessor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, job: MediaDownloadJob) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        // Also re-checks that the message belongs to the job's tenant.
        let message = self.ctx.store.get_message(tenant_id, &job.message_id).await?;
        if message.metadata.get("localPath").is_some() || message.metadata.get("mediaUrl").is_some() {
            debug!(tenant_id, message_id = %message.id, "media already downloaded");
            return Ok(());
        }

        let payload = self.ctx.gateway.download_media(tenant_id, &job.media_id).await?;
        let mime_type = payload
            .mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(clean_mime)
            .unwrap_or_else(|| clean_mime(&job.mime_type));

        let stored = self
            .ctx
            .media
            .save(tenant_id, &job.media_type, &mime_type, &payload.bytes)
            .await?;
        metrics::counter!(MEDIA_BYTES_TOTAL).increment(stored.file_size);

        let mut metadata = match message.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        metadata.insert("localPath".into(), json!(stored.local_path));
        metadata.insert("mediaUrl".into(), json!(stored.public_url));
        metadata.insert("fileSize".into(), json!(stored.file_size));
        metadata.insert("downloadedAt".into(), json!(Utc::now()));

        let linked = self
            .ctx
            .store
            .update_message(
                tenant_id,
                &message.id,
                MessagePatch {
                    metadata: Some(Value::Object(metadata)),
                    ..Default::default()
                },
            )
            .await;
        if let Err(e) = linked {
            // The retry downloads again under a new name.
            if let Err(cleanup) = self.ctx.media.remove(&stored).await {
                warn!(tenant_id, path = %stored.local_path, error = %cleanup, "failed to remove unlinked media file");
            }
            return Err(e);
        }

        info!(
            tenant_id,
            message_id = %message.id,
            media_id = %job.media_id,
            mime_type,
            file_size = stored.file_size,
            "media downloaded"
        );
        Ok(())
    }
}

#[async_trait]
impl Processor for MediaProcessor {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError> {
        self.handle(job.decode()?).await
    }
}
