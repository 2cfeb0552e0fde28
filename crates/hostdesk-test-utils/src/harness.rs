// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for pipeline integration tests.
//!
//! `TestHarness` assembles a temp SQLite store, a job queue with fast
//! polling, a mock gateway, a recording event sink and a configuration with
//! one channel, so processors can be exercised without external services.

use std::path::PathBuf;
use std::sync::Arc;

use hostdesk_config::model::{
    ChannelConfig, EscalationConfig, HostdeskConfig, MediaConfig, PageChannel, PageConfig,
    QueuePolicy, QueuesConfig, StorageConfig,
};
use hostdesk_core::{HostdeskError, StorageAdapter};
use hostdesk_queue::JobQueue;
use hostdesk_storage::SqliteStorage;

use crate::mock_agent::RecordingAgent;
use crate::mock_gateway::MockGateway;
use crate::recording_sink::RecordingSink;

/// Policy used for every queue: quick polling, short backoff.
fn fast_policy(concurrency: usize) -> QueuePolicy {
    QueuePolicy {
        concurrency,
        attempts: 3,
        backoff_ms: 20,
        poll_interval_ms: 10,
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    escalation: EscalationConfig,
    queues: Option<QueuesConfig>,
    media_retention_days: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            escalation: EscalationConfig::default(),
            queues: None,
            media_retention_days: 30,
        }
    }

    /// Replaces the escalation settings (keywords, hotel units, follow-up delay).
    pub fn with_escalation(mut self, escalation: EscalationConfig) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn with_followup_delay_secs(mut self, secs: u64) -> Self {
        self.escalation.followup_delay_secs = secs;
        self
    }

    /// Overrides the fast default queue policies.
    pub fn with_queues(mut self, queues: QueuesConfig) -> Self {
        self.queues = Some(queues);
        self
    }

    pub fn with_media_retention_days(mut self, days: u64) -> Self {
        self.media_retention_days = days;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, HostdeskError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| HostdeskError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let media_dir = temp_dir.path().join("media");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let storage = Arc::new(SqliteStorage::new(storage_config.clone()));
        storage.initialize().await?;

        let queues = self.queues.unwrap_or_else(|| QueuesConfig {
            incoming: fast_policy(2),
            status: fast_policy(2),
            outgoing: fast_policy(1),
            media: fast_policy(1),
            ia_reactivation: fast_policy(1),
            messenger: fast_policy(1),
            instagram: fast_policy(1),
            ..QueuesConfig::default()
        });
        let jobs = JobQueue::new(storage.clone(), queues.clone());

        let config = HostdeskConfig {
            storage: storage_config,
            queues,
            channels: vec![ChannelConfig {
                phone_number_id: TestHarness::PHONE_NUMBER_ID.to_string(),
                tenant_id: TestHarness::TENANT_ID.to_string(),
                access_token: "test-token".to_string(),
            }],
            media: MediaConfig {
                storage_dir: media_dir.to_string_lossy().to_string(),
                public_base_url: TestHarness::MEDIA_BASE_URL.to_string(),
                retention_days: self.media_retention_days,
            },
            escalation: self.escalation,
            pages: vec![
                PageConfig {
                    page_id: TestHarness::MESSENGER_PAGE_ID.to_string(),
                    tenant_id: TestHarness::TENANT_ID.to_string(),
                    channel: PageChannel::Messenger,
                },
                PageConfig {
                    page_id: TestHarness::INSTAGRAM_ACCOUNT_ID.to_string(),
                    tenant_id: TestHarness::TENANT_ID.to_string(),
                    channel: PageChannel::Instagram,
                },
            ],
            ..HostdeskConfig::default()
        };

        Ok(TestHarness {
            store: storage.clone(),
            storage,
            jobs,
            gateway: Arc::new(MockGateway::new()),
            events: Arc::new(RecordingSink::new()),
            agent: Arc::new(RecordingAgent::new()),
            config,
            media_dir,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// Concrete SQLite adapter (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The same adapter behind the storage trait.
    pub store: Arc<dyn StorageAdapter>,
    /// Job queue over the same database.
    pub jobs: JobQueue,
    pub gateway: Arc<MockGateway>,
    pub events: Arc<RecordingSink>,
    pub agent: Arc<RecordingAgent>,
    /// Configuration with a single channel for [`TestHarness::TENANT_ID`].
    pub config: HostdeskConfig,
    /// Where media downloads are written.
    pub media_dir: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub const TENANT_ID: &'static str = "hotel-test";
    pub const PHONE_NUMBER_ID: &'static str = "100200300";
    pub const MEDIA_BASE_URL: &'static str = "http://media.test/files";
    pub const MESSENGER_PAGE_ID: &'static str = "page-100";
    pub const INSTAGRAM_ACCOUNT_ID: &'static str = "ig-200";

    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Closes the store. The temp directory is removed on drop.
    pub async fn close(&self) {
        if let Err(e) = self.storage.close().await {
            tracing::warn!(error = %e, "failed to close test storage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostdesk_queue::QueueName;

    #[tokio::test]
    async fn harness_wires_one_channel() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert_eq!(
            harness.config.tenant_for_phone_number_id(TestHarness::PHONE_NUMBER_ID),
            Some(TestHarness::TENANT_ID)
        );
        assert!(
            harness
                .config
                .page(PageChannel::Instagram, TestHarness::INSTAGRAM_ACCOUNT_ID)
                .is_some()
        );
        assert_eq!(harness.jobs.options(QueueName::Media).attempts, 3);
        let contact = harness
            .store
            .find_or_create_contact(TestHarness::TENANT_ID, "5511999990000", Some("Ana"))
            .await
            .unwrap();
        assert_eq!(contact.name.as_deref(), Some("Ana"));
        harness.close().await;
    }

    #[tokio::test]
    async fn builder_overrides_followup_delay() {
        let harness = TestHarness::builder()
            .with_followup_delay_secs(5)
            .build()
            .await
            .unwrap();
        assert_eq!(harness.config.escalation.followup_delay_secs, 5);
        harness.close().await;
    }
}
