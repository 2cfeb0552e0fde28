// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem storage for downloaded media.
//!
//! Files are laid out as `{root}/{tenant}/{yyyy}/{mm}/{dd}/{kind}/{uuid}{ext}`
//! and published as `{public_base_url}/{tenant}/{uuid}{ext}`.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use hostdesk_config::model::MediaConfig;
use hostdesk_core::types::StoredMedia;
use hostdesk_core::{HostdeskError, MediaStorage};

const DEFAULT_EXTENSION: &str = ".bin";

/// Drops parameters (`audio/ogg; codecs=opus` -> `audio/ogg`) and lowercases.
pub fn clean_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// File extension, with the leading dot, for a MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match clean_mime(mime_type).as_str() {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "video/mp4" => ".mp4",
        "video/3gpp" => ".3gp",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        "audio/mpeg" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/opus" => ".opus",
        "audio/wav" => ".wav",
        "audio/aac" => ".aac",
        "audio/amr" => ".amr",
        "application/pdf" => ".pdf",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.ms-powerpoint" => ".ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        _ => DEFAULT_EXTENSION,
    }
}

/// MIME type served for a stored file name. Inverse of [`extension_for`].
pub fn mime_for_file(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "amr" => "audio/amr",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

fn io_err(e: std::io::Error) -> HostdeskError {
    HostdeskError::Storage { source: e.into() }
}

/// Tenant ids and file names end up in paths; refuse anything that could
/// escape the media root.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

pub struct FsMediaStorage {
    root: PathBuf,
    public_base_url: String,
    retention: Duration,
}

impl FsMediaStorage {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.storage_dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            retention: Duration::from_secs(config.retention_days.saturating_mul(86_400)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locates a file previously returned by [`MediaStorage::save`] from the
    /// last two segments of its public URL.
    pub async fn find(
        &self,
        tenant_id: &str,
        file_name: &str,
    ) -> Result<Option<PathBuf>, HostdeskError> {
        if !is_safe_segment(tenant_id) || !is_safe_segment(file_name) {
            return Ok(None);
        }
        let tenant_dir = self.root.join(tenant_id);
        let mut pending = vec![tenant_dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                let file_type = entry.file_type().await.map_err(io_err)?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if entry.file_name() == file_name {
                    return Ok(Some(entry.path()));
                }
            }
        }
        Ok(None)
    }

    /// Deletes files older than the retention window and prunes the empty
    /// directories left behind. Returns the number of files removed.
    pub async fn purge_expired(&self) -> Result<u64, HostdeskError> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0u64;
        let mut dirs = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                let path = entry.path();
                let meta = entry.metadata().await.map_err(io_err)?;
                if meta.is_dir() {
                    dirs.push(path.clone());
                    pending.push(path);
                    continue;
                }
                let expired = meta.modified().map(|m| m <= cutoff).unwrap_or(false);
                if expired {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove media file"),
                    }
                }
            }
        }

        // Deepest first; non-empty directories refuse removal.
        for dir in dirs.iter().rev() {
            let _ = tokio::fs::remove_dir(dir).await;
        }

        info!(removed, retention_days = self.retention.as_secs() / 86_400, "media cleanup completed");
        Ok(removed)
    }
}

#[async_trait]
impl MediaStorage for FsMediaStorage {
    async fn save(
        &self,
        tenant_id: &str,
        media_kind: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<StoredMedia, HostdeskError> {
        if !is_safe_segment(tenant_id) || !is_safe_segment(media_kind) {
            return Err(HostdeskError::BadRequest(format!(
                "invalid media location {tenant_id}/{media_kind}"
            )));
        }

        let now = Utc::now();
        let file_name = format!("{}{}", uuid::Uuid::new_v4(), extension_for(mime_type));
        let dir = self
            .root
            .join(tenant_id)
            .join(now.format("%Y").to_string())
            .join(now.format("%m").to_string())
            .join(now.format("%d").to_string())
            .join(media_kind);
        tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;

        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;

        debug!(tenant_id, media_kind, file_size = bytes.len(), path = %path.display(), "media saved");
        Ok(StoredMedia {
            local_path: path.to_string_lossy().into_owned(),
            public_url: format!("{}/{tenant_id}/{file_name}", self.public_base_url),
            file_size: bytes.len() as u64,
        })
    }

    async fn remove(&self, stored: &StoredMedia) -> Result<(), HostdeskError> {
        let path = Path::new(&stored.local_path);
        if !path.starts_with(&self.root) {
            return Err(HostdeskError::BadRequest(format!(
                "{} is outside the media root",
                stored.local_path
            )));
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}
