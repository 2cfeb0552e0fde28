// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalations and the IA lock.
//!
//! A locked conversation suppresses the automated agent. The lock is held by
//! `system` (escalation or human request), `system:followup` (time-bounded,
//! released by a delayed reactivation job) or an attendant's user id.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use hostdesk_bus::RealtimeEvent;
use hostdesk_core::types::{
    Conversation, ConversationPatch, ConversationStatus, Escalation, EscalationOutcome,
    EscalationRequest, EscalationStats, EscalationStatus, IaLockChange, LockOwner,
};
use hostdesk_core::{EscalationFilter, HostdeskError};
use hostdesk_queue::QueueName;

use crate::context::PipelineContext;
use crate::payloads::IaReactivationJob;

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

/// Drops `+`, spaces and dashes without judging what is left.
pub fn strip_phone_separators(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-'))
        .collect()
}

/// Strips `+`, spaces and dashes and checks for 10 to 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, HostdeskError> {
    let phone = strip_phone_separators(raw);
    let valid = phone.chars().all(|c| c.is_ascii_digit())
        && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&phone.len());
    if !valid {
        return Err(HostdeskError::BadRequest(format!(
            "invalid phone number: {raw}"
        )));
    }
    Ok(phone)
}

/// Answer of [`EscalationManager::is_ia_locked_by_phone`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IaLockState {
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// `conversation:updated` payload describing the lock fields.
fn lock_updates(conversation: &Conversation) -> serde_json::Value {
    json!({
        "iaLocked": conversation.ia_locked,
        "iaLockedAt": conversation.ia_locked_at,
        "iaLockedBy": conversation.ia_locked_by,
    })
}

#[derive(Clone)]
pub struct EscalationManager {
    ctx: PipelineContext,
}

impl EscalationManager {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Hands a customer over to a human.
    ///
    /// Contact, active conversation, imported history and the `PENDING`
    /// escalation are written in one transaction; the conversation ends up
    /// locked by `system`.
    pub async fn escalate(
        &self,
        mut request: EscalationRequest,
    ) -> Result<EscalationOutcome, HostdeskError> {
        request.contact_phone_number = normalize_phone(&request.contact_phone_number)?;
        let outcome = self.ctx.store.create_escalation(request).await?;

        info!(
            tenant_id = %outcome.escalation.tenant_id,
            escalation_id = %outcome.escalation.id,
            conversation_id = %outcome.conversation.id,
            reason = %outcome.escalation.reason,
            hotel_unit = ?outcome.escalation.hotel_unit,
            conversation_created = outcome.conversation_created,
            imported_messages = outcome.imported_messages,
            "escalation created"
        );

        self.ctx.publish(RealtimeEvent::ConversationNew {
            conversation: outcome.conversation.clone(),
            escalation: Some(outcome.escalation.clone()),
        });
        self.ctx.publish(RealtimeEvent::EscalationNew {
            escalation: outcome.escalation.clone(),
            conversation: outcome.conversation.clone(),
            contact: outcome.contact.clone(),
        });
        Ok(outcome)
    }

    /// `IN_PROGRESS` with a user records the attendant; `RESOLVED` and
    /// `CANCELLED` record the resolution time.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        escalation_id: &str,
        status: EscalationStatus,
        user_id: Option<&str>,
    ) -> Result<Escalation, HostdeskError> {
        let escalation = self
            .ctx
            .store
            .update_escalation_status(tenant_id, escalation_id, status, user_id)
            .await?;
        info!(tenant_id, escalation_id, status = %status, user_id, "escalation status updated");
        Ok(escalation)
    }

    pub async fn get(&self, tenant_id: &str, escalation_id: &str) -> Result<Escalation, HostdeskError> {
        self.ctx.store.get_escalation(tenant_id, escalation_id).await
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        filter: EscalationFilter,
    ) -> Result<Vec<Escalation>, HostdeskError> {
        self.ctx.store.list_escalations(tenant_id, filter).await
    }

    pub async fn stats(&self, tenant_id: &str) -> Result<EscalationStats, HostdeskError> {
        self.ctx.store.escalation_stats(tenant_id).await
    }

    /// Manual lock or unlock by an attendant, independent of escalations.
    pub async fn toggle_ia_lock(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        locked: bool,
        user_id: &str,
    ) -> Result<Conversation, HostdeskError> {
        let change = if locked {
            IaLockChange::Lock {
                by: LockOwner::User(user_id.to_string()),
                at: Utc::now(),
            }
        } else {
            IaLockChange::Unlock
        };
        let conversation = self
            .ctx
            .store
            .update_conversation(
                tenant_id,
                conversation_id,
                ConversationPatch {
                    ia_lock: Some(change),
                    ..Default::default()
                },
            )
            .await?;

        self.ctx.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation.id.clone(),
            hotel_unit: conversation.hotel_unit.clone(),
            updates: lock_updates(&conversation),
        });
        info!(tenant_id, conversation_id, ia_locked = locked, user_id, "conversation IA lock toggled");
        Ok(conversation)
    }

    /// Locks the active conversation of `phone` as `system:followup` and
    /// schedules its reactivation after the configured delay.
    ///
    /// A failure to schedule is logged; the lock stays in place.
    pub async fn lock_for_followup(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Conversation, HostdeskError> {
        let phone = normalize_phone(phone)?;
        let contact = self
            .ctx
            .store
            .find_contact_by_phone(tenant_id, &phone)
            .await?
            .ok_or_else(|| HostdeskError::not_found("contact", phone.clone()))?;
        let active = self
            .ctx
            .store
            .find_active_conversation(tenant_id, &contact.id)
            .await?
            .ok_or_else(|| HostdeskError::not_found("active conversation", contact.id.clone()))?;

        let locked_at = Utc::now();
        let conversation = self
            .ctx
            .store
            .update_conversation(
                tenant_id,
                &active.id,
                ConversationPatch {
                    status: Some(ConversationStatus::Open),
                    ia_lock: Some(IaLockChange::Lock {
                        by: LockOwner::Followup,
                        at: locked_at,
                    }),
                    ..Default::default()
                },
            )
            .await?;

        let job = IaReactivationJob {
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation.id.clone(),
        };
        let delay = Duration::from_secs(self.ctx.config.escalation.followup_delay_secs);
        let options = self
            .ctx
            .jobs
            .options(QueueName::IaReactivation)
            .with_delay(delay)
            .with_dedup_key(job.dedup_key(locked_at.timestamp_millis()));
        if let Err(e) = self.ctx.jobs.enqueue(QueueName::IaReactivation, &job, options).await {
            warn!(tenant_id, conversation_id = %conversation.id, error = %e, "failed to schedule IA reactivation");
        }

        self.ctx.publish(RealtimeEvent::ConversationNew {
            conversation: conversation.clone(),
            escalation: None,
        });
        let mut updates = lock_updates(&conversation);
        updates["status"] = json!(conversation.status);
        self.ctx.publish(RealtimeEvent::ConversationUpdated {
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation.id.clone(),
            hotel_unit: conversation.hotel_unit.clone(),
            updates,
        });

        info!(
            tenant_id,
            conversation_id = %conversation.id,
            delay_secs = delay.as_secs(),
            "conversation locked for follow-up"
        );
        Ok(conversation)
    }

    /// Whether the automated agent must stay silent for `phone`.
    ///
    /// Unknown contacts and contacts without an active conversation are
    /// reported as unlocked. The phone is only stripped of separators, so
    /// ids the agent holds that would fail [`normalize_phone`] still get
    /// an answer.
    pub async fn is_ia_locked_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<IaLockState, HostdeskError> {
        let unlocked = IaLockState {
            locked: false,
            conversation_id: None,
        };
        let phone = strip_phone_separators(phone);
        if phone.is_empty() {
            return Ok(unlocked);
        }
        let Some(contact) = self.ctx.store.find_contact_by_phone(tenant_id, &phone).await? else {
            return Ok(unlocked);
        };
        let Some(conversation) = self
            .ctx
            .store
            .find_active_conversation(tenant_id, &contact.id)
            .await?
        else {
            return Ok(unlocked);
        };
        Ok(IaLockState {
            locked: conversation.ia_locked,
            conversation_id: Some(conversation.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hostdesk_core::types::{EscalationReason, HistoryEntry, Priority};
    use hostdesk_test_utils::TestHarness;

    use crate::testing::context;

    fn request(phone: &str) -> EscalationRequest {
        EscalationRequest {
            tenant_id: TestHarness::TENANT_ID.into(),
            contact_phone_number: phone.into(),
            contact_name: Some("Marina".into()),
            reason: EscalationReason::UserRequested,
            reason_detail: Some("quer falar com atendente".into()),
            hotel_unit: Some("Ilhabela".into()),
            priority: Priority::High,
            ai_context: None,
            message_history: vec![
                HistoryEntry {
                    role: "user".into(),
                    content: "Oi".into(),
                    timestamp: None,
                },
                HistoryEntry {
                    role: "assistant".into(),
                    content: "Olá! Como posso ajudar?".into(),
                    timestamp: None,
                },
            ],
        }
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+55 11 99999-0000").unwrap(), "5511999990000");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("5511abc990000").is_err());
        assert!(matches!(
            normalize_phone("1234567890123456"),
            Err(HostdeskError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn escalating_new_phone_creates_locked_conversation() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));

        let outcome = manager.escalate(request("+55 11 98888-7777")).await.unwrap();
        assert_eq!(outcome.contact.phone_number.as_deref(), Some("5511988887777"));
        assert!(outcome.conversation_created);
        assert!(outcome.conversation.ia_locked);
        assert_eq!(outcome.conversation.ia_locked_by.as_deref(), Some("system"));
        assert_eq!(outcome.escalation.status, EscalationStatus::Pending);
        assert_eq!(outcome.imported_messages, 2);
        assert_eq!(
            harness.events.names(),
            vec!["conversation:new", "escalation:new"]
        );
        harness.close().await;
    }

    #[tokio::test]
    async fn escalation_rejects_bad_phone() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        let err = manager.escalate(request("12")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(harness.events.events().is_empty());
        harness.close().await;
    }

    #[tokio::test]
    async fn status_updates_stamp_attendant_and_resolution() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        let outcome = manager.escalate(request("5511988887777")).await.unwrap();
        let id = outcome.escalation.id;

        let attended = manager
            .update_status(TestHarness::TENANT_ID, &id, EscalationStatus::InProgress, Some("user-1"))
            .await
            .unwrap();
        assert_eq!(attended.attended_by_id.as_deref(), Some("user-1"));
        assert!(attended.attended_at.is_some());

        let resolved = manager
            .update_status(TestHarness::TENANT_ID, &id, EscalationStatus::Resolved, None)
            .await
            .unwrap();
        assert!(resolved.resolved_at.is_some());

        let err = manager
            .update_status("other-tenant", &id, EscalationStatus::Cancelled, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let stats = manager.stats(TestHarness::TENANT_ID).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.get("RESOLVED"), Some(&1));
        assert_eq!(
            manager
                .list(TestHarness::TENANT_ID, EscalationFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
        harness.close().await;
    }

    #[tokio::test]
    async fn manual_toggle_sets_and_clears_owner() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        let outcome = manager.escalate(request("5511988887777")).await.unwrap();
        harness.events.clear();

        let unlocked = manager
            .toggle_ia_lock(TestHarness::TENANT_ID, &outcome.conversation.id, false, "user-1")
            .await
            .unwrap();
        assert!(!unlocked.ia_locked);
        assert!(unlocked.ia_locked_by.is_none());

        let locked = manager
            .toggle_ia_lock(TestHarness::TENANT_ID, &outcome.conversation.id, true, "user-1")
            .await
            .unwrap();
        assert_eq!(locked.lock_owner(), Some(LockOwner::User("user-1".into())));

        let events = harness.events.events();
        assert_eq!(events.len(), 2);
        match &events[1] {
            RealtimeEvent::ConversationUpdated { updates, .. } => {
                assert_eq!(updates["iaLocked"], true);
                assert_eq!(updates["iaLockedBy"], "user-1");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let err = manager
            .toggle_ia_lock(TestHarness::TENANT_ID, "missing", true, "user-1")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        harness.close().await;
    }

    #[tokio::test]
    async fn followup_lock_schedules_delayed_reactivation() {
        let harness = TestHarness::builder()
            .with_followup_delay_secs(3600)
            .build()
            .await
            .unwrap();
        let manager = EscalationManager::new(context(&harness));
        let contact = harness
            .store
            .find_or_create_contact(TestHarness::TENANT_ID, "5511977776666", None)
            .await
            .unwrap();
        harness
            .store
            .find_or_create_active_conversation(TestHarness::TENANT_ID, &contact.id)
            .await
            .unwrap();

        let conversation = manager
            .lock_for_followup(TestHarness::TENANT_ID, "5511977776666")
            .await
            .unwrap();
        assert_eq!(conversation.lock_owner(), Some(LockOwner::Followup));
        assert_eq!(conversation.status, ConversationStatus::Open);

        let counts = harness.jobs.counts(QueueName::IaReactivation).await.unwrap();
        assert_eq!(counts.delayed, 1);
        assert!(harness.jobs.claim(QueueName::IaReactivation).await.unwrap().is_none());

        let state = manager
            .is_ia_locked_by_phone(TestHarness::TENANT_ID, "5511977776666")
            .await
            .unwrap();
        assert_eq!(
            state,
            IaLockState {
                locked: true,
                conversation_id: Some(conversation.id)
            }
        );
        harness.close().await;
    }

    #[tokio::test]
    async fn followup_lock_without_contact_is_not_found() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        let err = manager
            .lock_for_followup(TestHarness::TENANT_ID, "5511900000000")
            .await
            .unwrap_err();
        assert!(matches!(err, HostdeskError::NotFound { .. }));
        harness.close().await;
    }

    #[tokio::test]
    async fn unknown_phone_is_unlocked() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        let state = manager
            .is_ia_locked_by_phone(TestHarness::TENANT_ID, "5511900000000")
            .await
            .unwrap();
        assert!(!state.locked);
        assert!(state.conversation_id.is_none());
        harness.close().await;
    }

    #[tokio::test]
    async fn lock_query_accepts_ids_outside_phone_rules() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        for raw in ["1234567890123456", "abc", "+", ""] {
            let state = manager
                .is_ia_locked_by_phone(TestHarness::TENANT_ID, raw)
                .await
                .unwrap();
            assert!(!state.locked, "{raw}");
        }
        harness.close().await;
    }

    #[tokio::test]
    async fn lock_query_finds_long_contact_id() {
        let harness = TestHarness::builder().build().await.unwrap();
        let manager = EscalationManager::new(context(&harness));
        let contact = harness
            .store
            .find_or_create_contact(TestHarness::TENANT_ID, "1234567890123456", None)
            .await
            .unwrap();
        let (conversation, _) = harness
            .store
            .find_or_create_active_conversation(TestHarness::TENANT_ID, &contact.id)
            .await
            .unwrap();
        manager
            .toggle_ia_lock(TestHarness::TENANT_ID, &conversation.id, true, "user-1")
            .await
            .unwrap();

        let state = manager
            .is_ia_locked_by_phone(TestHarness::TENANT_ID, "+1234567890123456")
            .await
            .unwrap();
        assert!(state.locked);
        assert_eq!(state.conversation_id, Some(conversation.id));
        harness.close().await;
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn separators_are_stripped(digits in "[0-9]{10,15}", seps in proptest::collection::vec("[+ -]", 0..6)) {
                let mut raw = String::new();
                for (i, c) in digits.chars().enumerate() {
                    if let Some(sep) = seps.get(i) {
                        raw.push_str(sep);
                    }
                    raw.push(c);
                }
                prop_assert_eq!(normalize_phone(&raw).unwrap(), digits);
            }

            #[test]
            fn out_of_range_lengths_rejected(digits in "[0-9]{1,9}|[0-9]{16,20}") {
                prop_assert!(normalize_phone(&digits).is_err());
            }
        }
    }
}
