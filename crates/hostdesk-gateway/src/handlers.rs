// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook, health, metrics and media routes.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use hostdesk_core::{HostdeskError, PluginAdapter};
use hostdesk_core::types::HealthStatus;
use hostdesk_pipeline::media_store::mime_for_file;
use hostdesk_pipeline::{WebhookPayload, verify_signature, verify_subscription};

use crate::server::GatewayState;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Query string of the GET subscription handshake.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode", default)]
    pub mode: String,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: String,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", "degraded" or "unhealthy".
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(err: &HostdeskError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// GET /webhooks/whatsapp
///
/// Echoes `hub.challenge` when the verify token matches, 403 otherwise.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    match verify_subscription(
        state.config.whatsapp.verify_token.as_deref(),
        &query.mode,
        &query.verify_token,
        &query.challenge,
    ) {
        Some(challenge) => {
            tracing::info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            tracing::warn!(mode = %query.mode, "webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhooks/{whatsapp,messenger,instagram}
///
/// Verifies the signature over the raw body (when an app secret is
/// configured), classifies the delivery and enqueues its jobs.
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.config.whatsapp.app_secret.as_deref() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, &body, signature) {
            tracing::warn!(error = %e, "webhook signature rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "invalid signature".into(),
                }),
            )
                .into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("malformed webhook body: {e}"),
                }),
            )
                .into_response();
        }
    };

    match state.dispatcher.dispatch(&payload).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            // The provider redelivers on non-2xx, so nothing is lost.
            tracing::error!(error = %e, "failed to enqueue webhook");
            error_response(&e)
        }
    }
}

/// GET /health
///
/// 200 while storage is healthy or degraded, 503 when it is down.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let (status, detail) = match state.store.health_check().await {
        Ok(HealthStatus::Healthy) => ("healthy", None),
        Ok(HealthStatus::Degraded(reason)) => ("degraded", Some(reason)),
        Ok(HealthStatus::Unhealthy(reason)) => ("unhealthy", Some(reason)),
        Err(e) => ("unhealthy", Some(e.to_string())),
    };
    let code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        detail,
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when no recorder is installed.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /media/{tenant}/{file}
pub async fn get_media(
    State(state): State<GatewayState>,
    Path((tenant_id, file_name)): Path<(String, String)>,
) -> Response {
    let Some(media) = &state.media else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let path = match media.find(&tenant_id, &file_name).await {
        Ok(Some(path)) => path,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return error_response(&e),
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime_for_file(&file_name))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read media file");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use hostdesk_core::MediaStorage;
    use hostdesk_pipeline::FsMediaStorage;
    use hostdesk_queue::QueueName;
    use hostdesk_test_utils::TestHarness;
    use serde_json::{Value, json};
    use sha2::Sha256;
    use tower::ServiceExt;

    use crate::server::router;
    use crate::testing::{state, state_with_config};

    fn delivery() -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "5511300000000",
                            "phone_number_id": TestHarness::PHONE_NUMBER_ID
                        },
                        "contacts": [{"profile": {"name": "Marina"}, "wa_id": "5511987654321"}],
                        "messages": [{
                            "id": "wamid.G1",
                            "from": "5511987654321",
                            "timestamp": "1760000000",
                            "type": "text",
                            "text": {"body": "Olá"}
                        }]
                    }
                }]
            }]
        })
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let harness = TestHarness::builder().build().await.unwrap();
        let mut config = harness.config.clone();
        config.whatsapp.verify_token = Some("s3cret".into());
        let app = router(state_with_config(&harness, config));

        let ok = app
            .clone()
            .oneshot(
                Request::get("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=s3cret&hub.challenge=4242")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let bytes = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"4242");

        let denied = app
            .oneshot(
                Request::get("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=4242")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        harness.close().await;
    }

    #[tokio::test]
    async fn delivery_is_queued() {
        let harness = TestHarness::builder().build().await.unwrap();
        let app = router(state(&harness, None));

        let response = app
            .oneshot(
                Request::post("/webhooks/whatsapp")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(delivery().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["messages"], 1);
        assert_eq!(harness.jobs.counts(QueueName::Incoming).await.unwrap().waiting, 1);
        harness.close().await;
    }

    #[tokio::test]
    async fn signature_is_enforced_when_secret_set() {
        let harness = TestHarness::builder().build().await.unwrap();
        let mut config = harness.config.clone();
        config.whatsapp.app_secret = Some("app-secret".into());
        let app = router(state_with_config(&harness, config));
        let body = delivery().to_string();

        let unsigned = app
            .clone()
            .oneshot(Request::post("/webhooks/whatsapp").body(Body::from(body.clone())).unwrap())
            .await
            .unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let signed = app
            .oneshot(
                Request::post("/webhooks/whatsapp")
                    .header(SIGNATURE_HEADER, sign("app-secret", body.as_bytes()))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(signed.status(), StatusCode::OK);
        harness.close().await;
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let harness = TestHarness::builder().build().await.unwrap();
        let response = router(state(&harness, None))
            .oneshot(Request::post("/webhooks/whatsapp").body(Body::from("{not json")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        harness.close().await;
    }

    #[tokio::test]
    async fn unsupported_object_is_acknowledged() {
        let harness = TestHarness::builder().build().await.unwrap();
        let response = router(state(&harness, None))
            .oneshot(
                Request::post("/webhooks/whatsapp")
                    .body(Body::from(json!({"object": "user", "entry": []}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["dropped"], 1);
        harness.close().await;
    }

    #[tokio::test]
    async fn messenger_webhook_queues_page_message() {
        let harness = TestHarness::builder().build().await.unwrap();
        let body = json!({
            "object": "page",
            "entry": [{
                "id": TestHarness::MESSENGER_PAGE_ID,
                "messaging": [{
                    "sender": {"id": "psid-1"},
                    "timestamp": 1767225600000_i64,
                    "message": {"mid": "m.1", "text": "Oi"}
                }]
            }]
        });
        let response = router(state(&harness, None))
            .oneshot(
                Request::post("/webhooks/messenger")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["messages"], 1);
        let counts = harness.jobs.counts(QueueName::Messenger).await.unwrap();
        assert_eq!(counts.waiting, 1);
        harness.close().await;
    }

    #[tokio::test]
    async fn health_reports_storage_and_uptime() {
        let harness = TestHarness::builder().build().await.unwrap();
        let response = router(state(&harness, None))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["uptime_secs"].is_u64());
        harness.close().await;
    }

    #[tokio::test]
    async fn metrics_render_when_installed() {
        let harness = TestHarness::builder().build().await.unwrap();
        let mut with_render = state(&harness, None);
        with_render.health.prometheus_render = Some(Arc::new(|| "hostdesk_jobs_total 3\n".to_string()));

        let response = router(with_render)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("hostdesk_jobs_total 3"));

        let missing = router(state(&harness, None))
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        harness.close().await;
    }

    #[tokio::test]
    async fn stored_media_is_served() {
        let harness = TestHarness::builder().build().await.unwrap();
        let media = Arc::new(FsMediaStorage::new(&harness.config.media));
        let stored = media
            .save(TestHarness::TENANT_ID, "image", "image/png", b"png-bytes")
            .await
            .unwrap();
        let file_name = stored.public_url.rsplit('/').next().unwrap().to_string();
        let app = router(state(&harness, Some(media)));

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/media/{}/{file_name}", TestHarness::TENANT_ID))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png-bytes");

        let other_tenant = app
            .oneshot(
                Request::get(format!("/media/hotel-other/{file_name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(other_tenant.status(), StatusCode::NOT_FOUND);
        harness.close().await;
    }
}
