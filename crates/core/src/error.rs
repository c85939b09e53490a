//! Unified error types for the BI backend.
//!
//! The taxonomy distinguishes vendor failures by retryability: the queue is
//! the sole retry authority and uses `is_retryable` to decide between
//! re-queueing and the dead-letter lane.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the BI backend.
#[derive(Debug, Error)]
pub enum Error {
    /// A required entity (project, counter, account, ...) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A natural-key field is missing or out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate natural key on create.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Retryable vendor failure (HTTP 429, 5xx, network timeout).
    #[error("vendor error (transient): {message}")]
    VendorTransient { code: Option<i64>, message: String },

    /// Non-retryable vendor failure (4xx, vendor error envelope).
    #[error("vendor error (permanent): {message}")]
    VendorPermanent { code: Option<i64>, message: String },

    /// Database failure; surfaced to the queue for retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Task-context cancellation (timeout or shutdown).
    #[error("canceled: {0}")]
    Canceled(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn vendor_transient(code: Option<i64>, msg: impl Into<String>) -> Self {
        Self::VendorTransient {
            code,
            message: msg.into(),
        }
    }

    pub fn vendor_permanent(code: Option<i64>, msg: impl Into<String>) -> Self {
        Self::VendorPermanent {
            code,
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn canceled(msg: impl Into<String>) -> Self {
        Self::Canceled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the queue may retry a task that failed with this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VendorTransient { .. } | Self::Storage(_) | Self::Canceled(_) | Self::Internal(_)
        )
    }

    /// Whether this is a transient vendor failure (skippable branch in the
    /// ingestion pipeline).
    pub fn is_vendor_transient(&self) -> bool {
        matches!(self, Self::VendorTransient { .. })
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::VendorTransient { .. } => 503,
            Self::VendorPermanent { .. } => 502,
            Self::Storage(_) => 500,
            Self::Canceled(_) => 500,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".into()),
            other => Self::Storage(other.to_string()),
        }
    }
}
