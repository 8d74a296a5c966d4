//! Property-based tests for the refund state machine.
//!
//! - Only the five documented edges are valid
//! - Payable never goes negative and never exceeds the refundable amount
//! - Terminal states accept no transition

use chrono::NaiveDate;
use lessonbook_shared::types::{ContractId, Money, OperatorId};
use proptest::prelude::*;

use super::error::RefundError;
use super::service::RefundService;
use super::types::{ApproveRefundInput, RefundCaseState, RefundStatus};
use crate::ledger::{ContractState, ContractStatus};

fn any_status() -> impl Strategy<Value = RefundStatus> {
    prop_oneof![
        Just(RefundStatus::Pending),
        Just(RefundStatus::Approved),
        Just(RefundStatus::Rejected),
        Just(RefundStatus::Completed),
        Just(RefundStatus::Cancelled),
    ]
}

fn is_documented_edge(from: RefundStatus, to: RefundStatus) -> bool {
    use RefundStatus::{Approved, Cancelled, Completed, Pending, Rejected};
    matches!(
        (from, to),
        (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Completed)
    )
}

fn contract(value_cents: i64, total: u32, remain: u32) -> ContractState {
    let value = Money::from_cents(value_cents);
    ContractState {
        id: ContractId::new(),
        total_lessons: total,
        used_lessons: total - remain,
        remain_lessons: remain,
        refunded_lessons: 0,
        contract_value: value,
        unit_price: value.div_lessons(total).unwrap(),
        paid_amount: value,
        unearned: value.pro_rata(remain, total).unwrap(),
        status: ContractStatus::Active,
        end_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        version: 0,
    }
}

proptest! {
    /// Transition validation accepts exactly the documented edges.
    #[test]
    fn prop_transition_table(from in any_status(), to in any_status()) {
        let result = RefundService::validate_transition(from, to);
        prop_assert_eq!(result.is_ok(), is_documented_edge(from, to));
        if let Err(err) = result {
            let is_invalid_transition = matches!(err, RefundError::InvalidTransition { .. });
            prop_assert!(is_invalid_transition);
        }
    }

    /// Terminal states never transition.
    #[test]
    fn prop_terminal_states_are_final(to in any_status()) {
        for from in [RefundStatus::Rejected, RefundStatus::Completed, RefundStatus::Cancelled] {
            prop_assert!(from.is_terminal());
            prop_assert!(RefundService::validate_transition(from, to).is_err());
        }
    }

    /// A successful quote never pays out more than the remaining liability or less than zero.
    #[test]
    fn prop_quote_bounds(
        value_cents in 1i64..100_000_000,
        total in 1u32..200,
        remain_seed in 0u32..200,
        deduction_cents in 0i64..100_000_000,
    ) {
        let remain = remain_seed % (total + 1);
        let c = contract(value_cents, total, remain);
        match RefundService::preview(&c, Money::from_cents(deduction_cents)) {
            Ok(quote) => {
                prop_assert!(!quote.payable_amount.is_negative());
                prop_assert!(quote.payable_amount <= quote.refundable_amount);
                prop_assert_eq!(quote.refundable_amount, c.unearned);
                prop_assert_eq!(quote.payable_amount + quote.deduction, quote.refundable_amount);
            }
            Err(err) => {
                let is_deduction_error = matches!(err, RefundError::DeductionExceedsRefundable { .. });
                prop_assert!(is_deduction_error);
                prop_assert!(Money::from_cents(deduction_cents) > c.unearned);
            }
        }
    }

    /// Approval amounts stay inside `[0, refundable]`.
    #[test]
    fn prop_adjusted_amount_policy(
        refundable_cents in 0i64..10_000_000,
        adjusted_cents in -1_000i64..20_000_000,
    ) {
        let state = RefundCaseState {
            id: lessonbook_shared::types::RefundCaseId::new(),
            contract_id: ContractId::new(),
            status: RefundStatus::Pending,
            refundable_amount: Money::from_cents(refundable_cents),
            payable_amount: Money::from_cents(refundable_cents),
            approved_amount: None,
        };
        let result = RefundService::approve(&state, ApproveRefundInput {
            approved: true,
            remark: None,
            adjusted_amount: Some(Money::from_cents(adjusted_cents)),
            approver: OperatorId::new(),
        });
        let in_range = adjusted_cents >= 0 && adjusted_cents <= refundable_cents;
        prop_assert_eq!(result.is_ok(), in_range);
    }
}
