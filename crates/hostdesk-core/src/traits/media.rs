// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media storage trait for downloaded attachments.

use async_trait::async_trait;

use crate::error::HostdeskError;
use crate::types::StoredMedia;

/// Tenant-scoped file storage for media downloaded from a channel.
#[async_trait]
pub trait MediaStorage: Send + Sync + 'static {
    /// Persists `bytes` and returns where they were written.
    ///
    /// `media_kind` is the lowercase message type (`image`, `audio`, ...).
    async fn save(
        &self,
        tenant_id: &str,
        media_kind: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<StoredMedia, HostdeskError>;

    /// Deletes a file returned by [`MediaStorage::save`]. Already missing
    /// files are not an error.
    async fn remove(&self, stored: &StoredMedia) -> Result<(), HostdeskError>;
}
