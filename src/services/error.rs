//! Errors raised by the exam core.

use thiserror::Error;

/// Failure classes shared by the catalog, sessions, history and stats.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// Caller-fixable input problem (bad answer letter, missing field, bad index).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation not allowed in the current session state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0}")]
    NotFound(String),

    /// Persistence failure; the driver error is kept as the source.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// A background write ended without a result (panicked or aborted).
    #[error("background write failed: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}
