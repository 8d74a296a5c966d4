//! Forecast error types.

use lessonbook_shared::ErrorCategory;
use thiserror::Error;

/// Errors that can occur during forecast operations.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Horizon outside `1..=52` weeks.
    #[error("Forecast horizon must be between 1 and 52 weeks, got {0}")]
    InvalidHorizon(u32),

    /// History window outside `1..=52` weeks.
    #[error("History window must be between 1 and 52 weeks, got {0}")]
    InvalidHistoryWindow(u32),

    /// A tuning parameter is out of range.
    #[error("Invalid forecast parameter: {0}")]
    InvalidParameter(String),

    /// Period key is not a valid ISO week.
    #[error("Invalid period key '{0}', expected YYYY-Www")]
    InvalidPeriodKey(String),

    /// Override values are malformed.
    #[error("Invalid override: {0}")]
    InvalidOverride(String),

    /// The bucket's override is locked.
    #[error("Forecast period {period_key} is locked")]
    Locked {
        /// Locked bucket.
        period_key: String,
    },

    /// No override exists for the bucket.
    #[error("No override for forecast period {period_key}")]
    OverrideNotFound {
        /// Requested bucket.
        period_key: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForecastError {
    /// Returns the taxonomy category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidHorizon(_)
            | Self::InvalidHistoryWindow(_)
            | Self::InvalidParameter(_)
            | Self::InvalidPeriodKey(_)
            | Self::InvalidOverride(_) => ErrorCategory::Validation,
            Self::Locked { .. } => ErrorCategory::Locked,
            Self::OverrideNotFound { .. } => ErrorCategory::NotFound,
            Self::Database(_) => ErrorCategory::Database,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidHorizon(_) => "INVALID_HORIZON",
            Self::InvalidHistoryWindow(_) => "INVALID_HISTORY_WINDOW",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::InvalidPeriodKey(_) => "INVALID_PERIOD_KEY",
            Self::InvalidOverride(_) => "INVALID_OVERRIDE",
            Self::Locked { .. } => "PERIOD_LOCKED",
            Self::OverrideNotFound { .. } => "OVERRIDE_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.category().status_code()
    }

    /// Returns true if this error is retryable.
    ///
    /// Forecast operations never race on a version check.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ForecastError::InvalidHorizon(0).http_status_code(), 400);
        assert_eq!(
            ForecastError::Locked {
                period_key: "2025-W10".into()
            }
            .http_status_code(),
            423
        );
        assert_eq!(
            ForecastError::OverrideNotFound {
                period_key: "2025-W10".into()
            }
            .http_status_code(),
            404
        );
        assert_eq!(ForecastError::Database(String::new()).http_status_code(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ForecastError::InvalidHorizon(60).to_string(),
            "Forecast horizon must be between 1 and 52 weeks, got 60"
        );
    }
}
