// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hostdesk serve` command implementation.
//!
//! Opens the SQLite store, builds the channel gateway, media storage and
//! event bus, starts one worker pool per queue, and serves the HTTP gateway
//! until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hostdesk_config::HostdeskConfig;
use hostdesk_core::types::HealthStatus;
use hostdesk_core::{HostdeskError, PluginAdapter, StorageAdapter};
use hostdesk_gateway::{GatewayState, HealthState, start_server};
use hostdesk_pipeline::{
    FsMediaStorage, HttpAgentForwarder, Pipeline, PipelineContext, WebhookDispatcher,
};
use hostdesk_prometheus::{PrometheusAdapter, spawn_queue_gauges};
use hostdesk_queue::JobQueue;
use hostdesk_storage::SqliteStorage;
use hostdesk_whatsapp::CloudApiGateway;

const QUEUE_GAUGE_INTERVAL: Duration = Duration::from_secs(15);

/// Runs the `hostdesk serve` command.
pub async fn run_serve(config: HostdeskConfig) -> Result<(), HostdeskError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting hostdesk serve");

    let start_time = Instant::now();
    let config = Arc::new(config);
    let cancel = install_signal_handler();

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let store: Arc<dyn StorageAdapter> = storage.clone();
    let jobs = JobQueue::new(storage.clone(), config.queues.clone());

    let gateway = Arc::new(CloudApiGateway::new(&config)?);
    if let Ok(HealthStatus::Degraded(reason)) = gateway.health_check().await {
        warn!(reason = %reason, "channel gateway degraded");
    }

    let media = Arc::new(FsMediaStorage::new(&config.media));

    let agent = HttpAgentForwarder::new(&config.agent)?;
    if !agent.is_enabled() {
        info!("no agent webhook configured, inbound messages stay in the inbox");
    }

    let (publisher, events_rx, hub) = hostdesk_bus::from_config(&config.bus);
    let hub_task = hub.clone().spawn(events_rx, cancel.clone());

    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };
    let gauge_task = prometheus
        .as_ref()
        .map(|_| spawn_queue_gauges(jobs.clone(), QUEUE_GAUGE_INTERVAL, cancel.clone()));

    let ctx = PipelineContext {
        config: config.clone(),
        store: store.clone(),
        gateway,
        media: media.clone(),
        events: Arc::new(publisher),
        agent: Arc::new(agent),
        jobs: jobs.clone(),
    };
    let pipeline = Pipeline::start(ctx, Some(media.clone()), &cancel).await?;

    let state = GatewayState {
        config: config.clone(),
        dispatcher: WebhookDispatcher::new(config.clone(), jobs.clone()),
        store,
        hub,
        media: Some(media),
        health: HealthState {
            start_time,
            prometheus_render: prometheus.as_ref().map(PrometheusAdapter::render_fn),
        },
    };
    let served = start_server(&config.server, state, cancel.clone()).await;

    // Either a signal arrived or the server failed to bind.
    info!("shutting down");
    cancel.cancel();
    jobs.pause_all();
    pipeline.shutdown().await;
    for task in [Some(hub_task), gauge_task].into_iter().flatten() {
        if let Err(e) = task.await {
            warn!(error = %e, "background task panicked");
        }
    }
    storage.close().await?;
    info!("hostdesk stopped");
    served
}

/// Cancels the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, only Ctrl+C stops the server");
                    let _ = ctrl_c.await;
                    info!("received Ctrl+C, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hostdesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_handler_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }
}
