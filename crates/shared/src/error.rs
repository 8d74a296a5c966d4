//! Application-wide error types.
//!
//! Every domain error in `lessonbook-core` maps onto one [`ErrorCategory`].
//! The category decides the HTTP status; the domain error keeps its own
//! fine-grained code for logs and response bodies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Error taxonomy shared by all ledger components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Entity id does not resolve.
    NotFound,
    /// Operation illegal for the current lifecycle status.
    InvalidState,
    /// Lesson count exceeds remaining lessons.
    InsufficientBalance,
    /// Negative or zero payable, discount above price, and similar.
    InvalidAmount,
    /// A refund for the same contract is already in flight.
    ConflictingRequest,
    /// The day was already settled for the location.
    AlreadySettled,
    /// Forecast bucket is locked.
    Locked,
    /// Malformed input.
    Validation,
    /// Concurrent modification detected; safe to retry.
    Concurrency,
    /// Storage failure.
    Database,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Returns the HTTP status code for this category.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidState
            | Self::ConflictingRequest
            | Self::AlreadySettled
            | Self::Concurrency => 409,
            Self::InsufficientBalance => 422,
            Self::InvalidAmount | Self::Validation => 400,
            Self::Locked => 423,
            Self::Database | Self::Internal => 500,
        }
    }

    /// Returns the category code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::ConflictingRequest => "CONFLICTING_REQUEST",
            Self::AlreadySettled => "ALREADY_SETTLED",
            Self::Locked => "LOCKED",
            Self::Validation => "VALIDATION_ERROR",
            Self::Concurrency => "CONCURRENT_MODIFICATION",
            Self::Database => "DATABASE_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns true for errors the caller caused (4xx).
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        !matches!(self, Self::Database | Self::Internal)
    }
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the taxonomy category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Database(_) => ErrorCategory::Database,
            Self::Configuration(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.category().status_code()
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            _ => self.category().code(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
