//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered to HTTP callers.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use coach_connect_core::{PortError, ServiceError};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error raised by one of the core services.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the database migrations at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Service(ServiceError::bad_request(message))
    }
}

impl From<PortError> for ApiError {
    fn from(e: PortError) -> Self {
        ApiError::Service(ServiceError::Port(e))
    }
}

// Extractor rejections are client mistakes and share the validation error body.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// The JSON body of every failed request.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error_code: String,
    pub is_operational: bool,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, error_code: &str, is_operational: bool) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: error_code.to_string(),
            is_operational,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

fn internal() -> (StatusCode, ErrorBody) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody::new("Internal server error", "INTERNAL_ERROR", false),
    )
}

fn classify(err: &ServiceError) -> (StatusCode, ErrorBody) {
    let status = match err {
        ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServiceError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Port(PortError::NotFound(detail)) => {
            warn!(%detail, "Storage reported a missing row");
            return (
                StatusCode::NOT_FOUND,
                ErrorBody::new("Resource not found", err.code(), true),
            );
        }
        ServiceError::Port(PortError::Conflict(detail)) => {
            warn!(%detail, "Storage constraint rejected a write");
            return (
                StatusCode::CONFLICT,
                ErrorBody::new("This resource already exists", err.code(), true),
            );
        }
        ServiceError::Port(PortError::Invalid(detail)) => {
            warn!(%detail, "Storage rejected invalid data");
            return (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Invalid data provided", err.code(), true),
            );
        }
        ServiceError::Port(PortError::Unexpected(detail)) => {
            error!(%detail, "Unexpected storage failure");
            return internal();
        }
    };
    (status, ErrorBody::new(err.to_string(), err.code(), true))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Service(err) => classify(err),
            other => {
                error!(error = %other, "Unhandled error while serving request");
                internal()
            }
        };
        (status, Json(body)).into_response()
    }
}
