//! crates/coach_connect_core/src/error.rs
//!
//! The operational error taxonomy shared by every core service.

use crate::ports::PortError;

/// Message used whenever a caller has to sign in again.
pub const SESSION_EXPIRED: &str = "Session expired, please login again";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    AuthenticationFailed(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// A collaborator failed in a way the service does not classify.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Stable, machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "VALIDATION_ERROR",
            ServiceError::AuthenticationFailed(_) => "AUTHENTICATION_ERROR",
            ServiceError::Forbidden(_) => "AUTHORIZATION_ERROR",
            ServiceError::NotFound(_) => "RESOURCE_NOT_FOUND",
            ServiceError::Conflict(_) => "RESOURCE_CONFLICT",
            ServiceError::Port(PortError::NotFound(_)) => "RESOURCE_NOT_FOUND",
            ServiceError::Port(PortError::Conflict(_)) => "RESOURCE_CONFLICT",
            ServiceError::Port(PortError::Invalid(_)) => "VALIDATION_ERROR",
            ServiceError::Port(PortError::Unexpected(_)) => "INTERNAL_ERROR",
        }
    }

    /// Operational errors are expected and safe to show to the caller.
    pub fn is_operational(&self) -> bool {
        !matches!(self, ServiceError::Port(PortError::Unexpected(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
