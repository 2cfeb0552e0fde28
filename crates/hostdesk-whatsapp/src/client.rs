// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud (Graph) API.
//!
//! Requests are authenticated per call with the tenant's access token, so a
//! single [`CloudApiClient`] serves every channel.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use hostdesk_config::model::WhatsAppConfig;
use hostdesk_core::HostdeskError;

use crate::types::ApiErrorResponse;

#[derive(Debug, Clone)]
pub struct CloudApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

/// Downloaded bytes and the content type the server reported.
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Client errors other than throttling fail the same way on retry.
fn is_permanent(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::TOO_MANY_REQUESTS
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::UNAUTHORIZED
}

fn status_error(status: StatusCode, body: &str) -> HostdeskError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => match api.error.code {
            Some(code) => format!("WhatsApp API error {code} ({status}): {}", api.error.message),
            None => format!("WhatsApp API error ({status}): {}", api.error.message),
        },
        Err(_) => format!("WhatsApp API returned {status}: {body}"),
    };
    if is_permanent(status) {
        HostdeskError::BadRequest(message)
    } else {
        HostdeskError::channel(message)
    }
}

impl CloudApiClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, HostdeskError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostdeskError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/{}",
                config.api_base_url.trim_end_matches('/'),
                config.api_version.trim_matches('/')
            ),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_error(&self, e: reqwest::Error) -> HostdeskError {
        if e.is_timeout() {
            return HostdeskError::Timeout {
                duration: self.timeout,
            };
        }
        HostdeskError::Channel {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }

    /// `POST {base}/{path}` with a JSON body.
    pub async fn post<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        body: &Value,
    ) -> Result<T, HostdeskError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.parse(response).await
    }

    /// `GET {base}/{path}`.
    pub async fn get<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T, HostdeskError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.parse(response).await
    }

    /// Fetches an absolute URL returned by the API (media downloads).
    pub async fn download(&self, token: &str, url: &str) -> Result<Download, HostdeskError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| self.request_error(e))?;
        debug!(size = bytes.len(), "media downloaded");
        Ok(Download {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn parse<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, HostdeskError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        debug!(status = %status, "cloud api response received");
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| HostdeskError::Channel {
            message: format!("failed to parse WhatsApp API response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}
