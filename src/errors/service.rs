use std::time::Duration;

use thiserror::Error;

use super::RepositoryError;
use crate::utils::{qr_code::QrError, short_code::ShortCodeError};

/// Error type for service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource already exists or conflict occurred
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is authenticated but lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Identity provider rejected or failed the sign-in
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A storage call did not finish before its deadline
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Short code generation failed: {0}")]
    ShortCode(#[from] ShortCodeError),

    /// Unrecoverable internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => Self::NotFound(msg),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::InvalidData(msg) => Self::Validation(msg),
            RepositoryError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<QrError> for ServiceError {
    fn from(err: QrError) -> Self {
        match err {
            QrError::InvalidColor(_) | QrError::InvalidSize(_) | QrError::SizeTooSmall { .. } => {
                Self::Validation(err.to_string())
            }
            QrError::Encode(_) | QrError::Image(_) => Self::Internal(err.to_string()),
        }
    }
}
