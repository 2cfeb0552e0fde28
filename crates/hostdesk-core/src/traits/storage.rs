// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the CRM entity store.

use async_trait::async_trait;

use crate::error::HostdeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Channel, Contact, Conversation, ConversationPatch, ConversationStatus, Escalation,
    EscalationOutcome, EscalationRequest, EscalationStats, EscalationStatus, InsertOutcome,
    Message, MessagePatch, NewMessage,
};

/// Filter for listing escalations.
#[derive(Debug, Clone, Default)]
pub struct EscalationFilter {
    pub status: Option<EscalationStatus>,
    pub hotel_unit: Option<String>,
    pub limit: Option<u32>,
}

/// Tenant-scoped persistence of contacts, conversations, messages and
/// escalations.
///
/// Every lookup takes the tenant id; rows belonging to another tenant are
/// reported as not found.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Runs migrations and prepares the backend.
    async fn initialize(&self) -> Result<(), HostdeskError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), HostdeskError>;

    /// Returns the contact for `(tenant, phone)`, creating it if absent.
    ///
    /// A non-empty `name` overwrites the stored one.
    async fn find_or_create_contact(
        &self,
        tenant_id: &str,
        phone_number: &str,
        name: Option<&str>,
    ) -> Result<Contact, HostdeskError>;

    /// Messenger or Instagram contact for a page-scoped sender id.
    async fn find_or_create_external_contact(
        &self,
        tenant_id: &str,
        channel: Channel,
        external_id: &str,
        name: Option<&str>,
    ) -> Result<Contact, HostdeskError>;

    async fn find_contact_by_phone(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<Contact>, HostdeskError>;

    async fn update_contact_profile_picture(
        &self,
        tenant_id: &str,
        contact_id: &str,
        url: &str,
    ) -> Result<(), HostdeskError>;

    /// Most recently updated active conversation of a contact.
    async fn find_active_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
    ) -> Result<Option<Conversation>, HostdeskError>;

    /// Returns the active conversation of a contact or opens a new one in
    /// `initial`. The flag is `true` when the conversation was created.
    ///
    /// Concurrent callers for the same contact observe a single conversation.
    async fn find_or_create_active_conversation_as(
        &self,
        tenant_id: &str,
        contact_id: &str,
        initial: ConversationStatus,
    ) -> Result<(Conversation, bool), HostdeskError>;

    /// [`Self::find_or_create_active_conversation_as`] opening in `OPEN`.
    async fn find_or_create_active_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
    ) -> Result<(Conversation, bool), HostdeskError> {
        self.find_or_create_active_conversation_as(tenant_id, contact_id, ConversationStatus::Open)
            .await
    }

    async fn get_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, HostdeskError>;

    /// Applies a partial update and returns the new snapshot.
    ///
    /// Setting status to `CLOSED` stamps `closed_at`; moving back to an
    /// active status clears it.
    async fn update_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        patch: ConversationPatch,
    ) -> Result<Conversation, HostdeskError>;

    /// Clears the IA lock only if it is still held by the follow-up owner.
    ///
    /// Returns the updated snapshot, or `None` when the lock was taken over
    /// or already released.
    async fn release_followup_lock(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, HostdeskError>;

    /// Inserts a message. Messages with an external id are unique per tenant.
    async fn insert_message(&self, message: NewMessage) -> Result<InsertOutcome, HostdeskError>;

    async fn get_message(
        &self,
        tenant_id: &str,
        message_id: &str,
    ) -> Result<Message, HostdeskError>;

    async fn find_message_by_external_id(
        &self,
        tenant_id: &str,
        external_message_id: &str,
    ) -> Result<Option<Message>, HostdeskError>;

    /// Tenant owning a message with this external id, across all tenants.
    ///
    /// Used to tell a missing message from one addressed to another tenant.
    async fn message_owner(
        &self,
        external_message_id: &str,
    ) -> Result<Option<String>, HostdeskError>;

    async fn update_message(
        &self,
        tenant_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, HostdeskError>;

    /// Messages of a conversation in timestamp order.
    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, HostdeskError>;

    /// Creates contact, conversation, imported history and escalation
    /// atomically.
    async fn create_escalation(
        &self,
        request: EscalationRequest,
    ) -> Result<EscalationOutcome, HostdeskError>;

    async fn get_escalation(
        &self,
        tenant_id: &str,
        escalation_id: &str,
    ) -> Result<Escalation, HostdeskError>;

    /// Sets the status of an escalation, stamping `attended_at` or
    /// `resolved_at` as appropriate.
    async fn update_escalation_status(
        &self,
        tenant_id: &str,
        escalation_id: &str,
        status: EscalationStatus,
        attended_by_id: Option<&str>,
    ) -> Result<Escalation, HostdeskError>;

    /// Escalations newest first.
    async fn list_escalations(
        &self,
        tenant_id: &str,
        filter: EscalationFilter,
    ) -> Result<Vec<Escalation>, HostdeskError>;

    async fn escalation_stats(&self, tenant_id: &str) -> Result<EscalationStats, HostdeskError>;
}
