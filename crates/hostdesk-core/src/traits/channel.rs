// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel gateway trait for WhatsApp-like messaging providers.

use async_trait::async_trait;

use crate::error::HostdeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MediaPayload, OutboundMedia, SendReceipt, TemplateMessage};

/// Sends messages and fetches media and profile data on behalf of a tenant.
#[async_trait]
pub trait ChannelGateway: PluginAdapter {
    async fn send_text(
        &self,
        tenant_id: &str,
        to: &str,
        text: &str,
    ) -> Result<SendReceipt, HostdeskError>;

    async fn send_media(
        &self,
        tenant_id: &str,
        to: &str,
        media: &OutboundMedia,
    ) -> Result<SendReceipt, HostdeskError>;

    async fn send_template(
        &self,
        tenant_id: &str,
        to: &str,
        template: &TemplateMessage,
    ) -> Result<SendReceipt, HostdeskError>;

    /// Marks an inbound message as read. Best-effort: failures are logged by
    /// the implementation and never returned.
    async fn mark_read(&self, tenant_id: &str, external_message_id: &str);

    async fn download_media(
        &self,
        tenant_id: &str,
        media_id: &str,
    ) -> Result<MediaPayload, HostdeskError>;

    /// Profile picture URL of a phone number, if the provider exposes one.
    async fn get_profile_picture(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<String>, HostdeskError>;
}
