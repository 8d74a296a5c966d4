//! Refund workflow error types.

use lessonbook_shared::ErrorCategory;
use lessonbook_shared::types::Money;
use thiserror::Error;
use uuid::Uuid;

use super::types::RefundStatus;
use crate::ledger::{ContractStatus, LedgerError};

/// Errors that can occur during refund operations.
#[derive(Debug, Error)]
pub enum RefundError {
    /// Refund case not found.
    #[error("Refund case not found: {0}")]
    CaseNotFound(Uuid),

    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: RefundStatus,
        /// The attempted target status.
        to: RefundStatus,
    },

    /// Refunds are only accepted for active contracts.
    #[error("Contract is {0}, refunds require an ACTIVE contract")]
    ContractNotActive(ContractStatus),

    /// Another refund for the contract is still in flight.
    #[error("Contract {contract_id} already has refund case {existing} in flight")]
    ConflictingRequest {
        /// Contract refunded.
        contract_id: Uuid,
        /// The in-flight case.
        existing: Uuid,
    },

    /// Deduction is negative.
    #[error("Deduction must not be negative, got {0}")]
    NegativeDeduction(Money),

    /// Deduction carries a fraction of a cent.
    #[error("Deduction must be whole cents, got {0}")]
    SubCentDeduction(Money),

    /// Deduction exceeds the refundable amount.
    #[error("Deduction {deduction} exceeds refundable amount {refundable}")]
    DeductionExceedsRefundable {
        /// Requested deduction.
        deduction: Money,
        /// Refundable amount.
        refundable: Money,
    },

    /// Adjusted payable amount is outside `[0, refundable]`.
    #[error("Adjusted amount {amount} must be between 0 and {max}")]
    AdjustedAmountOutOfRange {
        /// Requested amount.
        amount: Money,
        /// Refundable amount at request time.
        max: Money,
    },

    /// A rejection must explain itself.
    #[error("A remark is required when rejecting a refund")]
    RemarkRequired,

    /// A request must state a reason.
    #[error("A reason is required when requesting a refund")]
    ReasonRequired,

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RefundError {
    /// Returns the taxonomy category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::CaseNotFound(_) => ErrorCategory::NotFound,
            Self::InvalidTransition { .. } | Self::ContractNotActive(_) => {
                ErrorCategory::InvalidState
            }
            Self::ConflictingRequest { .. } => ErrorCategory::ConflictingRequest,
            Self::NegativeDeduction(_)
            | Self::SubCentDeduction(_)
            | Self::DeductionExceedsRefundable { .. }
            | Self::AdjustedAmountOutOfRange { .. } => ErrorCategory::InvalidAmount,
            Self::RemarkRequired | Self::ReasonRequired => ErrorCategory::Validation,
            Self::Ledger(err) => err.category(),
            Self::ConcurrentModification => ErrorCategory::Concurrency,
            Self::Database(_) => ErrorCategory::Database,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CaseNotFound(_) => "REFUND_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ContractNotActive(_) => "CONTRACT_NOT_ACTIVE",
            Self::ConflictingRequest { .. } => "CONFLICTING_REQUEST",
            Self::NegativeDeduction(_) => "NEGATIVE_DEDUCTION",
            Self::SubCentDeduction(_) => "SUB_CENT_DEDUCTION",
            Self::DeductionExceedsRefundable { .. } => "DEDUCTION_EXCEEDS_REFUNDABLE",
            Self::AdjustedAmountOutOfRange { .. } => "ADJUSTED_AMOUNT_OUT_OF_RANGE",
            Self::RemarkRequired => "REMARK_REQUIRED",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::Ledger(err) => err.error_code(),
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
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
        match self {
            Self::ConcurrentModification => true,
            Self::Ledger(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            RefundError::InvalidTransition {
                from: RefundStatus::Completed,
                to: RefundStatus::Approved,
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            RefundError::ConflictingRequest {
                contract_id: Uuid::nil(),
                existing: Uuid::nil(),
            }
            .category(),
            ErrorCategory::ConflictingRequest
        );
        assert_eq!(RefundError::RemarkRequired.http_status_code(), 400);
        assert_eq!(
            RefundError::DeductionExceedsRefundable {
                deduction: Money::from_cents(2),
                refundable: Money::from_cents(1),
            }
            .category(),
            ErrorCategory::InvalidAmount
        );
        assert_eq!(RefundError::CaseNotFound(Uuid::nil()).http_status_code(), 404);
    }

    #[test]
    fn test_ledger_errors_pass_through() {
        let err = RefundError::from(LedgerError::ContractNotFound(Uuid::nil()));
        assert_eq!(err.error_code(), "CONTRACT_NOT_FOUND");
        assert_eq!(err.http_status_code(), 404);
        assert!(RefundError::from(LedgerError::ConcurrentModification).is_retryable());
        assert!(!RefundError::RemarkRequired.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RefundError::InvalidTransition {
            from: RefundStatus::Pending,
            to: RefundStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from PENDING to COMPLETED"
        );
    }
}
