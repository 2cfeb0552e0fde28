// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for Hostdesk.
//!
//! The pipeline records through the metrics-rs facade. This crate installs
//! the Prometheus recorder, describes the pipeline's metrics, and renders
//! them for the gateway's /metrics endpoint.

pub mod recording;

use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use hostdesk_core::HostdeskError;
use hostdesk_queue::recording::JOB_DURATION_SECONDS;

pub use recording::{record_queue_counts, register_metrics, spawn_queue_gauges};

/// Job durations range from a few milliseconds (status receipts) to
/// tens of seconds (media downloads through a slow CDN).
const JOB_DURATION_BUCKETS: &[f64] = &[0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Owns the process-wide Prometheus recorder.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the recorder. A process holds at most one; a second call
    /// fails.
    pub fn new() -> Result<Self, HostdeskError> {
        let handle = builder()?
            .install_recorder()
            .map_err(|e| HostdeskError::Internal(format!("prometheus recorder: {e}")))?;
        register_metrics();
        tracing::info!("prometheus recorder installed");
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Render closure handed to the gateway's `/metrics` route.
    pub fn render_fn(&self) -> Arc<dyn Fn() -> String + Send + Sync> {
        let handle = self.handle.clone();
        Arc::new(move || handle.render())
    }
}

/// Exporter builder with the pipeline's histogram layout.
pub fn builder() -> Result<PrometheusBuilder, HostdeskError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(JOB_DURATION_SECONDS.to_string()), JOB_DURATION_BUCKETS)
        .map_err(|e| HostdeskError::Internal(format!("prometheus buckets: {e}")))
}
