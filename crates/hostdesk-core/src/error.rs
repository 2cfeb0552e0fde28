// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Hostdesk pipeline.

use thiserror::Error;

/// The primary error type used across adapter traits, processors and queues.
#[derive(Debug, Error)]
pub enum HostdeskError {
    /// A referenced entity does not exist for the requesting tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Role or ownership mismatch.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed input (invalid phone number, undecodable job payload, etc.).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Configuration errors (invalid TOML, missing channel credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel gateway errors (provider HTTP failure, rejected message, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Job queue runtime errors.
    #[error("queue error: {0}")]
    Queue(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HostdeskError {
    /// Shorthand for [`HostdeskError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`HostdeskError::Channel`] without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a job that failed with this error should be redelivered.
    ///
    /// Downstream failures are transient. Missing entities, ownership
    /// violations and malformed input will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::Forbidden(_) | Self::BadRequest(_) | Self::Config(_) => {
                false
            }
            Self::Storage { .. }
            | Self::Channel { .. }
            | Self::Queue(_)
            | Self::Timeout { .. }
            | Self::Internal(_) => true,
        }
    }

    /// HTTP status code equivalent for API surfaces.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::BadRequest(_) => 400,
            Self::Channel { .. } | Self::Storage { .. } | Self::Timeout { .. } => 503,
            Self::Config(_) | Self::Queue(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for HostdeskError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid JSON payload: {e}"))
    }
}
