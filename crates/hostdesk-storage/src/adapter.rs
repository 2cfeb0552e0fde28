// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter and JobStore traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use hostdesk_config::model::StorageConfig;
use hostdesk_core::types::{
    Channel, Contact, Conversation, ConversationPatch, ConversationStatus, Escalation,
    EscalationOutcome, EscalationRequest, EscalationStats, EscalationStatus, InsertOutcome,
    Message, MessagePatch, NewMessage,
};
use hostdesk_core::{
    AdapterType, EnqueueOutcome, EscalationFilter, FailOutcome, HealthStatus, HostdeskError, Job,
    JobOptions, JobStore, PluginAdapter, QueueCounts, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`].
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, HostdeskError> {
        self.db.get().ok_or_else(|| HostdeskError::Storage {
            source: "sqlite store used before initialize()".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, HostdeskError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT count(*) FROM jobs", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HostdeskError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!(path = %self.config.database_path, "sqlite store checkpointed for shutdown");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), HostdeskError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| HostdeskError::Storage {
            source: "sqlite store opened twice".into(),
        })?;
        debug!(path = %self.config.database_path, wal = self.config.wal_mode, "sqlite store open");
        Ok(())
    }

    async fn close(&self) -> Result<(), HostdeskError> {
        self.db()?.checkpoint().await?;
        debug!(path = %self.config.database_path, "sqlite store closed");
        Ok(())
    }

    // --- Contacts ---

    async fn find_or_create_contact(
        &self,
        tenant_id: &str,
        phone_number: &str,
        name: Option<&str>,
    ) -> Result<Contact, HostdeskError> {
        queries::contacts::find_or_create(self.db()?, tenant_id, phone_number, name).await
    }

    async fn find_or_create_external_contact(
        &self,
        tenant_id: &str,
        channel: Channel,
        external_id: &str,
        name: Option<&str>,
    ) -> Result<Contact, HostdeskError> {
        queries::contacts::find_or_create_external(self.db()?, tenant_id, channel, external_id, name)
            .await
    }

    async fn find_contact_by_phone(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<Contact>, HostdeskError> {
        queries::contacts::find_by_phone(self.db()?, tenant_id, phone_number).await
    }

    async fn update_contact_profile_picture(
        &self,
        tenant_id: &str,
        contact_id: &str,
        url: &str,
    ) -> Result<(), HostdeskError> {
        if queries::contacts::update_profile_picture(self.db()?, tenant_id, contact_id, url).await? {
            Ok(())
        } else {
            Err(HostdeskError::not_found("contact", contact_id))
        }
    }

    // --- Conversations ---

    async fn find_active_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
    ) -> Result<Option<Conversation>, HostdeskError> {
        queries::conversations::find_active(self.db()?, tenant_id, contact_id).await
    }

    async fn find_or_create_active_conversation_as(
        &self,
        tenant_id: &str,
        contact_id: &str,
        initial: ConversationStatus,
    ) -> Result<(Conversation, bool), HostdeskError> {
        queries::conversations::find_or_create_active(self.db()?, tenant_id, contact_id, initial)
            .await
    }

    async fn get_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, HostdeskError> {
        queries::conversations::get(self.db()?, tenant_id, conversation_id)
            .await?
            .ok_or_else(|| HostdeskError::not_found("conversation", conversation_id))
    }

    async fn update_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        patch: ConversationPatch,
    ) -> Result<Conversation, HostdeskError> {
        queries::conversations::update(self.db()?, tenant_id, conversation_id, patch)
            .await?
            .ok_or_else(|| HostdeskError::not_found("conversation", conversation_id))
    }

    async fn release_followup_lock(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, HostdeskError> {
        queries::conversations::release_followup_lock(self.db()?, tenant_id, conversation_id).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: NewMessage) -> Result<InsertOutcome, HostdeskError> {
        queries::messages::insert(self.db()?, message).await
    }

    async fn get_message(
        &self,
        tenant_id: &str,
        message_id: &str,
    ) -> Result<Message, HostdeskError> {
        queries::messages::get(self.db()?, tenant_id, message_id)
            .await?
            .ok_or_else(|| HostdeskError::not_found("message", message_id))
    }

    async fn find_message_by_external_id(
        &self,
        tenant_id: &str,
        external_message_id: &str,
    ) -> Result<Option<Message>, HostdeskError> {
        queries::messages::find_by_external_id(self.db()?, tenant_id, external_message_id).await
    }

    async fn message_owner(
        &self,
        external_message_id: &str,
    ) -> Result<Option<String>, HostdeskError> {
        queries::messages::owner_of_external_id(self.db()?, external_message_id).await
    }

    async fn update_message(
        &self,
        tenant_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, HostdeskError> {
        queries::messages::update(self.db()?, tenant_id, message_id, patch)
            .await?
            .ok_or_else(|| HostdeskError::not_found("message", message_id))
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, HostdeskError> {
        queries::messages::list_by_conversation(self.db()?, tenant_id, conversation_id).await
    }

    // --- Escalations ---

    async fn create_escalation(
        &self,
        request: EscalationRequest,
    ) -> Result<EscalationOutcome, HostdeskError> {
        queries::escalations::create(self.db()?, request).await
    }

    async fn get_escalation(
        &self,
        tenant_id: &str,
        escalation_id: &str,
    ) -> Result<Escalation, HostdeskError> {
        queries::escalations::get(self.db()?, tenant_id, escalation_id)
            .await?
            .ok_or_else(|| HostdeskError::not_found("escalation", escalation_id))
    }

    async fn update_escalation_status(
        &self,
        tenant_id: &str,
        escalation_id: &str,
        status: EscalationStatus,
        attended_by_id: Option<&str>,
    ) -> Result<Escalation, HostdeskError> {
        queries::escalations::update_status(
            self.db()?,
            tenant_id,
            escalation_id,
            status,
            attended_by_id,
        )
        .await?
        .ok_or_else(|| HostdeskError::not_found("escalation", escalation_id))
    }

    async fn list_escalations(
        &self,
        tenant_id: &str,
        filter: EscalationFilter,
    ) -> Result<Vec<Escalation>, HostdeskError> {
        queries::escalations::list(self.db()?, tenant_id, filter).await
    }

    async fn escalation_stats(&self, tenant_id: &str) -> Result<EscalationStats, HostdeskError> {
        queries::escalations::stats(self.db()?, tenant_id).await
    }
}

#[async_trait]
impl JobStore for SqliteStorage {
    async fn enqueue(
        &self,
        queue: &str,
        payload: Value,
        options: JobOptions,
    ) -> Result<EnqueueOutcome, HostdeskError> {
        queries::jobs::enqueue(self.db()?, queue, payload, options).await
    }

    async fn claim(&self, queue: &str, lease: Duration) -> Result<Option<Job>, HostdeskError> {
        queries::jobs::claim(self.db()?, queue, lease).await
    }

    async fn complete(&self, job_id: i64) -> Result<(), HostdeskError> {
        queries::jobs::complete(self.db()?, job_id).await
    }

    async fn fail(
        &self,
        job_id: i64,
        error: &str,
        retryable: bool,
    ) -> Result<FailOutcome, HostdeskError> {
        queries::jobs::fail(self.db()?, job_id, error, retryable).await
    }

    async fn recover_stale(&self, queue: &str) -> Result<u64, HostdeskError> {
        queries::jobs::recover_stale(self.db()?, queue).await
    }

    async fn counts(&self, queue: &str) -> Result<QueueCounts, HostdeskError> {
        queries::jobs::counts(self.db()?, queue).await
    }

    async fn clean(
        &self,
        queue: &str,
        completed_before: DateTime<Utc>,
        failed_before: DateTime<Utc>,
    ) -> Result<u64, HostdeskError> {
        queries::jobs::clean(self.db()?, queue, completed_before, failed_before).await
    }
}
