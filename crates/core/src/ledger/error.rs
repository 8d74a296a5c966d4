//! Ledger error types for validation and state errors.
//!
//! Covers contract signing, payments, lesson consumption, revocation and
//! termination. Every variant maps onto one [`ErrorCategory`].

use chrono::NaiveDate;
use lessonbook_shared::ErrorCategory;
use lessonbook_shared::types::Money;
use thiserror::Error;
use uuid::Uuid;

use super::types::ContractStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Lookup Errors ==========
    /// Contract not found.
    #[error("Contract not found: {0}")]
    ContractNotFound(Uuid),

    /// No contract carries this business number.
    #[error("Contract not found: {0}")]
    ContractNumberNotFound(String),

    /// Consumption record not found.
    #[error("Consumption record not found: {0}")]
    ConsumptionNotFound(Uuid),

    /// Package not found.
    #[error("Package not found: {0}")]
    PackageNotFound(Uuid),

    /// Customer not found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(Uuid),

    /// Location not found.
    #[error("Location not found: {0}")]
    LocationNotFound(Uuid),

    /// Teacher not found.
    #[error("Teacher not found: {0}")]
    TeacherNotFound(Uuid),

    // ========== Catalog State Errors ==========
    /// Package is off sale.
    #[error("Package {0} is not on sale")]
    PackageNotOnSale(Uuid),

    /// Package has no lessons.
    #[error("Package {0} has no lessons")]
    PackageWithoutLessons(Uuid),

    /// Location is inactive.
    #[error("Location {0} is inactive")]
    LocationInactive(Uuid),

    /// Teacher is inactive.
    #[error("Teacher {0} is inactive")]
    TeacherInactive(Uuid),

    /// Session location differs from the contract's location.
    #[error("Contract belongs to location {expected}, session is at {actual}")]
    LocationMismatch {
        /// Contract location.
        expected: Uuid,
        /// Session location.
        actual: Uuid,
    },

    // ========== Amount Errors ==========
    /// Discount is negative, exceeds the price, or has a fraction of a cent.
    #[error("Discount {discount} must be whole cents between 0 and the package price {price}")]
    InvalidDiscount {
        /// Requested discount.
        discount: Money,
        /// Package price.
        price: Money,
    },

    /// Payment amount must be positive.
    #[error("Payment amount must be positive, got {0}")]
    NonPositivePayment(Money),

    /// Payment exceeds the outstanding contract value.
    #[error("Payment {amount} exceeds the outstanding amount {outstanding}")]
    Overpayment {
        /// Requested payment.
        amount: Money,
        /// Contract value minus paid amount.
        outstanding: Money,
    },

    /// Lesson count must be positive.
    #[error("Lesson count must be positive")]
    ZeroLessons,

    // ========== Balance and Status Errors ==========
    /// More lessons requested than remain.
    #[error("Insufficient balance: requested {requested} lessons, {remaining} remaining")]
    InsufficientBalance {
        /// Lessons requested.
        requested: u32,
        /// Lessons remaining.
        remaining: u32,
    },

    /// Operation requires an active contract.
    #[error("Contract is {0}, expected ACTIVE")]
    ContractNotActive(ContractStatus),

    /// Terminated contracts never change again.
    #[error("Contract is terminated")]
    ContractTerminated,

    /// Lesson date lies after the validity window.
    #[error("Contract expired on {end_date}, lesson dated {lesson_date}")]
    ContractExpired {
        /// Last valid day.
        end_date: NaiveDate,
        /// Requested lesson date.
        lesson_date: NaiveDate,
    },

    /// Consumption record already revoked.
    #[error("Consumption record {0} is already revoked")]
    AlreadyRevoked(Uuid),

    /// An approved refund holds the remaining lessons until it is paid out.
    #[error("Contract has approved refund case {0} awaiting payout")]
    RefundAwaitingPayout(Uuid),

    /// Stored delta cannot be applied to the contract.
    #[error("Consumption record is inconsistent with its contract: {0}")]
    InconsistentRecord(String),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Contract version mismatch.
    #[error("Contract version mismatch for contract {contract_id}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The contract ID.
        contract_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the taxonomy category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ContractNotFound(_)
            | Self::ContractNumberNotFound(_)
            | Self::ConsumptionNotFound(_)
            | Self::PackageNotFound(_)
            | Self::CustomerNotFound(_)
            | Self::LocationNotFound(_)
            | Self::TeacherNotFound(_) => ErrorCategory::NotFound,

            Self::PackageNotOnSale(_)
            | Self::LocationInactive(_)
            | Self::TeacherInactive(_)
            | Self::LocationMismatch { .. }
            | Self::ContractNotActive(_)
            | Self::ContractTerminated
            | Self::ContractExpired { .. }
            | Self::AlreadyRevoked(_)
            | Self::RefundAwaitingPayout(_) => ErrorCategory::InvalidState,

            Self::PackageWithoutLessons(_) => ErrorCategory::Validation,

            Self::InvalidDiscount { .. }
            | Self::NonPositivePayment(_)
            | Self::Overpayment { .. }
            | Self::ZeroLessons => ErrorCategory::InvalidAmount,

            Self::InsufficientBalance { .. } => ErrorCategory::InsufficientBalance,

            Self::ConcurrentModification | Self::VersionMismatch { .. } => {
                ErrorCategory::Concurrency
            }

            Self::Database(_) => ErrorCategory::Database,
            Self::InconsistentRecord(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ContractNotFound(_) | Self::ContractNumberNotFound(_) => "CONTRACT_NOT_FOUND",
            Self::ConsumptionNotFound(_) => "CONSUMPTION_NOT_FOUND",
            Self::PackageNotFound(_) => "PACKAGE_NOT_FOUND",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::LocationNotFound(_) => "LOCATION_NOT_FOUND",
            Self::TeacherNotFound(_) => "TEACHER_NOT_FOUND",
            Self::PackageNotOnSale(_) => "PACKAGE_NOT_ON_SALE",
            Self::PackageWithoutLessons(_) => "PACKAGE_WITHOUT_LESSONS",
            Self::LocationInactive(_) => "LOCATION_INACTIVE",
            Self::TeacherInactive(_) => "TEACHER_INACTIVE",
            Self::LocationMismatch { .. } => "LOCATION_MISMATCH",
            Self::InvalidDiscount { .. } => "INVALID_DISCOUNT",
            Self::NonPositivePayment(_) => "NON_POSITIVE_PAYMENT",
            Self::Overpayment { .. } => "OVERPAYMENT",
            Self::ZeroLessons => "ZERO_LESSONS",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::ContractNotActive(_) => "CONTRACT_NOT_ACTIVE",
            Self::ContractTerminated => "CONTRACT_TERMINATED",
            Self::ContractExpired { .. } => "CONTRACT_EXPIRED",
            Self::AlreadyRevoked(_) => "ALREADY_REVOKED",
            Self::RefundAwaitingPayout(_) => "REFUND_AWAITING_PAYOUT",
            Self::InconsistentRecord(_) => "INCONSISTENT_RECORD",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::VersionMismatch { .. } => "CONTRACT_VERSION_MISMATCH",
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
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification | Self::VersionMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::InsufficientBalance {
                requested: 3,
                remaining: 1
            }
            .error_code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(LedgerError::ZeroLessons.error_code(), "ZERO_LESSONS");
        assert_eq!(
            LedgerError::ContractNotActive(ContractStatus::Completed).error_code(),
            "CONTRACT_NOT_ACTIVE"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            LedgerError::ContractNotFound(Uuid::nil()).http_status_code(),
            404
        );
        assert_eq!(LedgerError::ContractTerminated.http_status_code(), 409);
        assert_eq!(
            LedgerError::InsufficientBalance {
                requested: 2,
                remaining: 0
            }
            .http_status_code(),
            422
        );
        assert_eq!(
            LedgerError::NonPositivePayment(Money::ZERO).http_status_code(),
            400
        );
        assert_eq!(LedgerError::ConcurrentModification.http_status_code(), 409);
        assert_eq!(
            LedgerError::Database("test".to_string()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LedgerError::ConcurrentModification.is_retryable());
        assert!(
            LedgerError::VersionMismatch {
                contract_id: Uuid::nil(),
                expected: 1,
                actual: 2,
            }
            .is_retryable()
        );
        assert!(!LedgerError::ZeroLessons.is_retryable());
        assert!(!LedgerError::ContractTerminated.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::Overpayment {
            amount: Money::new(dec!(500.00)),
            outstanding: Money::new(dec!(200.00)),
        };
        assert_eq!(
            err.to_string(),
            "Payment 500.00 exceeds the outstanding amount 200.00"
        );

        let err = LedgerError::ContractNotActive(ContractStatus::Completed);
        assert_eq!(err.to_string(), "Contract is COMPLETED, expected ACTIVE");
    }
}
