//! Refund workflow state machine.
//!
//! Computes refundable value from the ledger and validates every
//! transition of a refund case. Completion is the only transition that
//! touches the contract; the repository layer pairs it with
//! [`LedgerService::terminate`] and the cash outflow in one transaction.
//!
//! [`LedgerService::terminate`]: crate::ledger::LedgerService::terminate

use chrono::Utc;
use lessonbook_shared::types::{Money, OperatorId, RefundCaseId};

use super::error::RefundError;
use super::types::{
    ApproveRefundInput, CompleteRefundInput, NewRefundCase, RefundAction, RefundCaseState,
    RefundQuote, RefundStatus, RequestRefundInput,
};
use crate::ledger::{ContractState, ContractStatus, LedgerService};

/// Stateless service for refund transitions.
pub struct RefundService;

impl RefundService {
    /// Quotes the refund for a contract. Pure read.
    ///
    /// # Errors
    ///
    /// - `NegativeDeduction` for a deduction below zero
    /// - `SubCentDeduction` for a deduction with a fraction of a cent
    /// - `DeductionExceedsRefundable` when the payable amount would be negative
    pub fn preview(contract: &ContractState, deduction: Money) -> Result<RefundQuote, RefundError> {
        if deduction.is_negative() {
            return Err(RefundError::NegativeDeduction(deduction));
        }
        if !deduction.is_whole_cents() {
            return Err(RefundError::SubCentDeduction(deduction));
        }
        let refundable = match contract.status {
            ContractStatus::Terminated => Money::ZERO,
            _ => LedgerService::liability(contract, contract.remain_lessons),
        };
        let payable = refundable - deduction;
        if payable.is_negative() {
            return Err(RefundError::DeductionExceedsRefundable {
                deduction,
                refundable,
            });
        }

        Ok(RefundQuote {
            contract_id: contract.id,
            remain_lessons: contract.remain_lessons,
            unit_price: contract.unit_price,
            refundable_amount: refundable,
            deduction,
            payable_amount: payable,
        })
    }

    /// Opens a refund case, snapshotting the quote at request time.
    ///
    /// `in_flight` is the id of a PENDING or APPROVED case already open for
    /// the contract, if any.
    ///
    /// # Errors
    ///
    /// - `ReasonRequired` for an empty reason
    /// - `ContractNotActive` unless the contract is active
    /// - `ConflictingRequest` when another case is in flight
    /// - any error from [`Self::preview`]
    pub fn request(
        contract: &ContractState,
        in_flight: Option<RefundCaseId>,
        input: RequestRefundInput,
    ) -> Result<NewRefundCase, RefundError> {
        if input.reason.trim().is_empty() {
            return Err(RefundError::ReasonRequired);
        }
        Self::ensure_refundable(contract)?;
        if let Some(existing) = in_flight {
            return Err(RefundError::ConflictingRequest {
                contract_id: contract.id.into_inner(),
                existing: existing.into_inner(),
            });
        }

        let quote = Self::preview(contract, input.deduction)?;

        Ok(NewRefundCase {
            id: RefundCaseId::new(),
            input,
            quote,
            status: RefundStatus::Pending,
            requested_at: Utc::now(),
        })
    }

    /// Fails unless the contract can still be refunded.
    ///
    /// Checked at request time and again before approval, so a case whose
    /// contract ran out of lessons while pending can only be rejected or
    /// cancelled.
    ///
    /// # Errors
    ///
    /// `ContractNotActive` unless the contract is active.
    pub fn ensure_refundable(contract: &ContractState) -> Result<(), RefundError> {
        if contract.status == ContractStatus::Active {
            Ok(())
        } else {
            Err(RefundError::ContractNotActive(contract.status))
        }
    }

    /// Approves or rejects a pending case.
    ///
    /// An approver may override the payable amount anywhere in
    /// `[0, refundable-at-request]`. Rejection leaves the contract untouched.
    /// Callers approving a case check [`Self::ensure_refundable`] first.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` unless the case is pending
    /// - `RemarkRequired` when rejecting without a remark
    /// - `AdjustedAmountOutOfRange` for an override outside the policy
    pub fn approve(
        case: &RefundCaseState,
        input: ApproveRefundInput,
    ) -> Result<RefundAction, RefundError> {
        let target = if input.approved {
            RefundStatus::Approved
        } else {
            RefundStatus::Rejected
        };
        Self::validate_transition(case.status, target)?;

        let remark = input
            .remark
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        if !input.approved {
            let remark = remark.ok_or(RefundError::RemarkRequired)?;
            return Ok(RefundAction::Reject {
                new_status: RefundStatus::Rejected,
                rejected_by: input.approver,
                rejected_at: Utc::now(),
                remark,
            });
        }

        let approved_amount = match input.adjusted_amount {
            Some(amount) if amount.is_negative() || amount > case.refundable_amount => {
                return Err(RefundError::AdjustedAmountOutOfRange {
                    amount,
                    max: case.refundable_amount,
                });
            }
            Some(amount) => amount.round_cents(),
            None => case.payable_amount,
        };

        Ok(RefundAction::Approve {
            new_status: RefundStatus::Approved,
            approved_amount,
            approved_by: input.approver,
            approved_at: Utc::now(),
            remark,
        })
    }

    /// Marks an approved case as paid out.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the case is approved.
    pub fn complete(
        case: &RefundCaseState,
        input: CompleteRefundInput,
    ) -> Result<RefundAction, RefundError> {
        Self::validate_transition(case.status, RefundStatus::Completed)?;

        Ok(RefundAction::Complete {
            new_status: RefundStatus::Completed,
            amount: case.approved_amount.unwrap_or(case.payable_amount),
            method: input.method,
            account: input.account,
            completed_by: input.completed_by,
            completed_at: Utc::now(),
        })
    }

    /// Withdraws a pending case.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the case is pending.
    pub fn cancel(
        case: &RefundCaseState,
        cancelled_by: OperatorId,
    ) -> Result<RefundAction, RefundError> {
        Self::validate_transition(case.status, RefundStatus::Cancelled)?;

        Ok(RefundAction::Cancel {
            new_status: RefundStatus::Cancelled,
            cancelled_by,
            cancelled_at: Utc::now(),
        })
    }

    /// Validates that a status transition is allowed.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for any edge outside the state machine.
    pub fn validate_transition(from: RefundStatus, to: RefundStatus) -> Result<(), RefundError> {
        let valid = matches!(
            (from, to),
            (
                RefundStatus::Pending,
                RefundStatus::Approved | RefundStatus::Rejected | RefundStatus::Cancelled
            ) | (RefundStatus::Approved, RefundStatus::Completed)
        );

        if valid {
            Ok(())
        } else {
            Err(RefundError::InvalidTransition { from, to })
        }
    }
}
