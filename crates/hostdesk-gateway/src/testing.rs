// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use hostdesk_bus::RoomHub;
use hostdesk_config::HostdeskConfig;
use hostdesk_pipeline::{FsMediaStorage, WebhookDispatcher};
use hostdesk_test_utils::TestHarness;

use crate::server::{GatewayState, HealthState};

pub fn state(harness: &TestHarness, media: Option<Arc<FsMediaStorage>>) -> GatewayState {
    GatewayState {
        media,
        ..state_with_config(harness, harness.config.clone())
    }
}

pub fn state_with_config(harness: &TestHarness, config: HostdeskConfig) -> GatewayState {
    let config = Arc::new(config);
    GatewayState {
        dispatcher: WebhookDispatcher::new(config.clone(), harness.jobs.clone()),
        config,
        store: harness.store.clone(),
        hub: Arc::new(RoomHub::new(16)),
        media: None,
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render: None,
        },
    }
}
