// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures shared by the unit tests of this crate.

use std::sync::Arc;

use serde_json::{Value, json};

use hostdesk_test_utils::TestHarness;

use crate::context::PipelineContext;
use crate::media_store::FsMediaStorage;
use crate::payloads::IncomingMessageJob;
use crate::webhook::InboundMessage;

pub const CUSTOMER_PHONE: &str = "5511987654321";

pub fn context(harness: &TestHarness) -> PipelineContext {
    PipelineContext {
        config: Arc::new(harness.config.clone()),
        store: harness.store.clone(),
        gateway: harness.gateway.clone(),
        media: Arc::new(FsMediaStorage::new(&harness.config.media)),
        events: harness.events.clone(),
        agent: harness.agent.clone(),
        jobs: harness.jobs.clone(),
    }
}

/// Provider message with the common envelope fields filled in.
pub fn inbound(id: &str, kind: &str, body: Value) -> InboundMessage {
    let mut raw = json!({
        "id": id,
        "from": CUSTOMER_PHONE,
        "timestamp": "1767268800",
        "type": kind,
    });
    if let (Some(raw), Some(body)) = (raw.as_object_mut(), body.as_object()) {
        raw.extend(body.clone());
    }
    serde_json::from_value(raw).unwrap()
}

pub fn text(id: &str, body: &str) -> InboundMessage {
    inbound(id, "text", json!({"text": {"body": body}}))
}

pub fn incoming_job(message: InboundMessage) -> IncomingMessageJob {
    IncomingMessageJob {
        tenant_id: TestHarness::TENANT_ID.to_string(),
        message,
        contact_name: Some("Marina Souza".to_string()),
    }
}
