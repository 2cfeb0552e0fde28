// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hands a conversation back to the IA once the follow-up window expires.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use hostdesk_bus::RealtimeEvent;
use hostdesk_core::types::LockOwner;
use hostdesk_core::{HostdeskError, Job};
use hostdesk_queue::Processor;

use crate::context::PipelineContext;
use crate::payloads::IaReactivationJob;
use crate::processors::IA_REACTIVATIONS_TOTAL;

pub struct ReactivationProcessor {
    ctx: PipelineContext,
}

impl ReactivationProcessor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Releases the lock only if the follow-up still owns it. A lock taken
    /// over by an attendant or the system in the meantime is left alone.
    pub async fn handle(&self, job: IaReactivationJob) -> Result<(), HostdeskError> {
        let tenant_id = job.tenant_id.as_str();
        let conversation = match self
            .ctx
            .store
            .get_conversation(tenant_id, &job.conversation_id)
            .await
        {
            Ok(conversation) => conversation,
            Err(HostdeskError::NotFound { .. }) => {
                info!(tenant_id, conversation_id = %job.conversation_id, "conversation gone, nothing to reactivate");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if conversation.status.is_finished() {
            debug!(tenant_id, conversation_id = %conversation.id, status = %conversation.status, "conversation finished, skipping reactivation");
            return Ok(());
        }
        if !conversation.ia_locked {
            debug!(tenant_id, conversation_id = %conversation.id, "IA already unlocked");
            return Ok(());
        }
        if conversation.lock_owner() != Some(LockOwner::Followup) {
            info!(
                tenant_id,
                conversation_id = %conversation.id,
                locked_by = conversation.ia_locked_by.as_deref().unwrap_or_default(),
                "lock taken over since the follow-up, skipping reactivation"
            );
            return Ok(());
        }

        let Some(released) = self
            .ctx
            .store
            .release_followup_lock(tenant_id, &conversation.id)
            .await?
        else {
            debug!(tenant_id, conversation_id = %conversation.id, "follow-up lock changed concurrently");
            return Ok(());
        };

        metrics::counter!(IA_REACTIVATIONS_TOTAL).increment(1);
        info!(tenant_id, conversation_id = %released.id, "IA reactivated after follow-up window");
        self.ctx.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: tenant_id.to_string(),
            conversation_id: released.id.clone(),
            hotel_unit: released.hotel_unit.clone(),
            updates: json!({
                "iaLocked": false,
                "iaLockedAt": null,
                "iaLockedBy": null,
            }),
        });
        Ok(())
    }
}

#[async_trait]
impl Processor for ReactivationProcessor {
    async fn process(&self, job: &Job) -> Result<(), HostdeskError> {
        self.handle(job.decode()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hostdesk_core::types::{Conversation, ConversationPatch, ConversationStatus, IaLockChange};
    use hostdesk_test_utils::TestHarness;

    use crate::escalation::EscalationManager;
    use crate::testing::{CUSTOMER_PHONE, context};

    async fn followup_locked(harness: &TestHarness) -> Conversation {
        let contact = harness
            .store
            .find_or_create_contact(TestHarness::TENANT_ID, CUSTOMER_PHONE, None)
            .await
            .unwrap();
        harness
            .store
            .find_or_create_active_conversation(TestHarness::TENANT_ID, &contact.id)
            .await
            .unwrap();
        EscalationManager::new(context(harness))
            .lock_for_followup(TestHarness::TENANT_ID, CUSTOMER_PHONE)
            .await
            .unwrap()
    }

    fn job(conversation: &Conversation) -> IaReactivationJob {
        IaReactivationJob {
            tenant_id: TestHarness::TENANT_ID.into(),
            conversation_id: conversation.id.clone(),
        }
    }

    #[tokio::test]
    async fn followup_lock_is_released() {
        let harness = TestHarness::builder().build().await.unwrap();
        let conversation = followup_locked(&harness).await;
        harness.events.clear();

        ReactivationProcessor::new(context(&harness))
            .handle(job(&conversation))
            .await
            .unwrap();

        let conversation = harness
            .store
            .get_conversation(TestHarness::TENANT_ID, &conversation.id)
            .await
            .unwrap();
        assert!(!conversation.ia_locked);
        assert!(conversation.ia_locked_by.is_none());
        assert_eq!(harness.events.names(), vec!["conversation:updated"]);
        harness.close().await;
    }

    #[tokio::test]
    async fn attendant_takeover_is_respected() {
        let harness = TestHarness::builder().build().await.unwrap();
        let conversation = followup_locked(&harness).await;
        harness
            .store
            .update_conversation(
                TestHarness::TENANT_ID,
                &conversation.id,
                ConversationPatch {
                    ia_lock: Some(IaLockChange::Lock {
                        by: LockOwner::User("attendant-7".into()),
                        at: Utc::now(),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        harness.events.clear();

        ReactivationProcessor::new(context(&harness))
            .handle(job(&conversation))
            .await
            .unwrap();

        let conversation = harness
            .store
            .get_conversation(TestHarness::TENANT_ID, &conversation.id)
            .await
            .unwrap();
        assert!(conversation.ia_locked);
        assert_eq!(conversation.ia_locked_by.as_deref(), Some("attendant-7"));
        assert!(harness.events.events().is_empty());
        harness.close().await;
    }

    #[tokio::test]
    async fn finished_conversation_is_left_alone() {
        let harness = TestHarness::builder().build().await.unwrap();
        let conversation = followup_locked(&harness).await;
        harness
            .store
            .update_conversation(
                TestHarness::TENANT_ID,
                &conversation.id,
                ConversationPatch {
                    status: Some(ConversationStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        ReactivationProcessor::new(context(&harness))
            .handle(job(&conversation))
            .await
            .unwrap();
        let conversation = harness
            .store
            .get_conversation(TestHarness::TENANT_ID, &conversation.id)
            .await
            .unwrap();
        assert!(conversation.ia_locked);
        harness.close().await;
    }

    #[tokio::test]
    async fn missing_conversation_completes() {
        let harness = TestHarness::builder().build().await.unwrap();
        let job = IaReactivationJob {
            tenant_id: TestHarness::TENANT_ID.into(),
            conversation_id: "gone".into(),
        };
        ReactivationProcessor::new(context(&harness)).handle(job).await.unwrap();
        harness.close().await;
    }
}
