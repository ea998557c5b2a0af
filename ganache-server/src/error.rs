//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ganache_core::MediaError;
use thiserror::Error;

use crate::store::StoreError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Not ready - a dependency failed its readiness probe
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Media error - upload, decode or storage failure
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Store error - metadata persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a not ready error
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Media(e) => match e {
                MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                MediaError::InvalidImage(_) | MediaError::Upload(_) => StatusCode::BAD_REQUEST,
                MediaError::Io(_) | MediaError::Variant { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Store(e) => match e {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::Duplicate(_) => StatusCode::CONFLICT,
                StoreError::Database(_) | StoreError::Migration(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotReady(_) => "NOT_READY",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Media(e) => match e {
                MediaError::TooLarge { .. } => "TOO_LARGE",
                MediaError::InvalidImage(_) => "INVALID_IMAGE",
                MediaError::Upload(_) => "INVALID_INPUT",
                MediaError::Io(_) | MediaError::Variant { .. } => "INTERNAL_ERROR",
            },
            Self::Store(e) => match e {
                StoreError::NotFound => "NOT_FOUND",
                StoreError::Duplicate(_) => "DUPLICATE",
                StoreError::Database(_) | StoreError::Migration(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::NotReady(_) => "Service not ready".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Media(e) => match e {
                MediaError::TooLarge { max } => {
                    format!("File exceeds maximum size of {} bytes", max)
                }
                MediaError::InvalidImage(reason) => format!("Invalid image: {}", reason),
                MediaError::Upload(_) => "Upload stream was interrupted".to_string(),
                MediaError::Io(_) | MediaError::Variant { .. } => {
                    "Internal server error".to_string()
                }
            },
            Self::Store(e) => match e {
                StoreError::NotFound => "Asset not found".to_string(),
                StoreError::Duplicate(existing) => {
                    format!("Asset already exists with id {}", existing.id)
                }
                StoreError::Database(_) | StoreError::Migration(_) => {
                    "Internal server error".to_string()
                }
            },
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::NotReady(_) => "not_ready",
            Self::Internal(_) => "internal",
            Self::Media(_) => "media",
            Self::Store(_) => "store",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Client mistakes are warnings; everything else carries full internal details
        if status.is_client_error() {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Service not ready"
            );
        } else {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                client_message = %client_message,
                "Server error (internal details logged)"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
