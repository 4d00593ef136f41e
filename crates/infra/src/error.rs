//! Service-level error model shared by every operation.

use thiserror::Error;

use loanops_auth::{AuthzError, PasswordError};
use loanops_cases::IngestError;
use loanops_core::DomainError;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Unknown user, inactive user and wrong password all look the same.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username already exists")]
    DuplicateUsername,

    #[error("weak password: {0}")]
    WeakPassword(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: missing permission '{permission}'")]
    Forbidden { permission: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate mapping: {0}")]
    DuplicateMapping(String),

    #[error("ingest failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("store failure in {operation}: {message}")]
    Store { operation: String, message: String },

    /// Hashing or signing broke; nothing the caller can fix.
    #[error("internal failure in {operation}: {message}")]
    Internal { operation: String, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateMapping(msg.into())
    }

    pub fn internal(operation: &str, message: impl Into<String>) -> Self {
        Self::Internal {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::DuplicateUsername => "duplicate_username",
            Self::WeakPassword(_) => "weak_password",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::DuplicateMapping(_) => "duplicate_mapping",
            Self::Ingest(_) => "ingest_error",
            Self::Store { .. } => "store_error",
            Self::Internal { .. } => "internal_error",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { message, .. } => Self::DuplicateMapping(message),
            StoreError::NotFound { message, .. } => Self::NotFound(message),
            StoreError::Conflict { message, .. } => Self::Conflict(message),
            StoreError::Backend { operation, message } => Self::Store { operation, message },
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvariantViolation(msg) => Self::Conflict(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(permission) => Self::Forbidden { permission },
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => Self::WeakPassword(err.to_string()),
            PasswordError::TooLong => Self::Validation(err.to_string()),
            other => Self::internal("credential_hash", other.to_string()),
        }
    }
}
