// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use hostdesk_bus::RoomHub;
use hostdesk_config::HostdeskConfig;
use hostdesk_config::model::ServerConfig;
use hostdesk_core::{HostdeskError, StorageAdapter};
use hostdesk_pipeline::{FsMediaStorage, WebhookDispatcher};

use crate::handlers;
use crate::ws;

/// Health state for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<HostdeskConfig>,
    /// Turns webhook deliveries into queued jobs.
    pub dispatcher: WebhookDispatcher,
    /// Used for health checks and conversation room authorization.
    pub store: Arc<dyn StorageAdapter>,
    /// Room fan-out for WebSocket clients.
    pub hub: Arc<RoomHub>,
    /// Serves downloaded media when set.
    pub media: Option<Arc<FsMediaStorage>>,
    pub health: HealthState,
}

/// Builds the full route table:
/// - GET/POST /webhooks/whatsapp, /webhooks/messenger, /webhooks/instagram
/// - GET /ws
/// - GET /health, GET /metrics
/// - GET /media/{tenant}/{file}
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/media/{tenant}/{file}", get(handlers::get_media));

    // One Meta app serves all three products; the body's `object` picks the queue.
    let webhook_routes = ["/webhooks/whatsapp", "/webhooks/messenger", "/webhooks/instagram"]
        .into_iter()
        .fold(Router::new(), |router, path| {
            router.route(
                path,
                get(handlers::verify_webhook).post(handlers::receive_webhook),
            )
        });

    // Tenant and room checks happen during the handshake.
    let ws_routes = Router::new().route("/ws", get(ws::ws_handler));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(ws_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), HostdeskError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HostdeskError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| HostdeskError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::state;
    use hostdesk_test_utils::TestHarness;

    #[tokio::test]
    async fn gateway_state_is_clone() {
        let harness = TestHarness::builder().build().await.unwrap();
        let state = state(&harness, None);
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&cloned.hub, &state.hub));
        harness.close().await;
    }

    #[tokio::test]
    async fn server_stops_on_cancel() {
        let harness = TestHarness::builder().build().await.unwrap();
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let cancel = CancellationToken::new();
        let state = state(&harness, None);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { start_server(&config, state, token).await });
        cancel.cancel();
        handle.await.unwrap().unwrap();
        harness.close().await;
    }
}
