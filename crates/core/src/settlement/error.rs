//! Settlement error types.

use chrono::NaiveDate;
use lessonbook_shared::ErrorCategory;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during settlement.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// A report for the day and location already exists.
    #[error("{date} is already settled for location {location_id}")]
    AlreadySettled {
        /// Business date.
        date: NaiveDate,
        /// Location.
        location_id: Uuid,
    },

    /// Location not found.
    #[error("Location not found: {0}")]
    LocationNotFound(Uuid),

    /// No report exists for the day and location.
    #[error("No settlement for {date} at location {location_id}")]
    ReportNotFound {
        /// Business date.
        date: NaiveDate,
        /// Location.
        location_id: Uuid,
    },

    /// The day has no representable local midnight in the business timezone.
    #[error("Cannot resolve day boundaries for {0}")]
    InvalidDate(NaiveDate),

    /// Date range is reversed.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidRange {
        /// Range start.
        from: NaiveDate,
        /// Range end.
        to: NaiveDate,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Returns the taxonomy category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadySettled { .. } => ErrorCategory::AlreadySettled,
            Self::LocationNotFound(_) | Self::ReportNotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidDate(_) | Self::InvalidRange { .. } => ErrorCategory::Validation,
            Self::Database(_) => ErrorCategory::Database,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadySettled { .. } => "ALREADY_SETTLED",
            Self::LocationNotFound(_) => "LOCATION_NOT_FOUND",
            Self::ReportNotFound { .. } => "SETTLEMENT_NOT_FOUND",
            Self::InvalidDate(_) => "INVALID_DATE",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.category().status_code()
    }

    /// Settlement is never retried automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}
