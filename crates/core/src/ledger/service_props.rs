//! Property-based tests for LedgerService.
//!
//! - Invariants hold after any sequence of consume/revoke/pay operations
//! - Consume followed by revoke restores the contract exactly
//! - Terminate is idempotent
//! - Fully consuming a contract recognizes exactly its value

use chrono::NaiveDate;
use lessonbook_shared::types::{ConsumptionId, ContractId, Money};
use proptest::prelude::*;

use super::service::LedgerService;
use super::types::{
    ConsumptionStatus, ContractState, ContractStatus, LedgerDelta, PaymentInput, PaymentMethod,
};

/// Strategy for contract values (0.01 to 1,000,000.00).
fn contract_value() -> impl Strategy<Value = Money> {
    (1i64..100_000_000i64).prop_map(Money::from_cents)
}

/// Strategy for lesson counts.
fn total_lessons() -> impl Strategy<Value = u32> {
    1u32..120
}

#[derive(Debug, Clone)]
enum Op {
    Consume(u32),
    RevokeOldest,
    RevokeNewest,
    Pay(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1u32..8).prop_map(Op::Consume),
        1 => Just(Op::RevokeOldest),
        1 => Just(Op::RevokeNewest),
        1 => (1i64..50_000).prop_map(Op::Pay),
    ]
}

fn lesson_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

fn new_contract(value: Money, lessons: u32) -> ContractState {
    ContractState {
        id: ContractId::new(),
        total_lessons: lessons,
        used_lessons: 0,
        remain_lessons: lessons,
        refunded_lessons: 0,
        contract_value: value,
        unit_price: value.div_lessons(lessons).unwrap(),
        paid_amount: Money::ZERO,
        unearned: value,
        status: ContractStatus::Active,
        end_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        version: 0,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Invariants hold after every operation in an arbitrary sequence.
    #[test]
    fn prop_invariants_hold_after_any_sequence(
        value in contract_value(),
        lessons in total_lessons(),
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let mut state = new_contract(value, lessons);
        let mut open: Vec<LedgerDelta> = Vec::new();

        for op in ops {
            match op {
                Op::Consume(n) => {
                    if let Ok(outcome) = LedgerService::consume(&state, n, lesson_date()) {
                        open.push(outcome.delta);
                        state = outcome.after;
                    }
                }
                Op::RevokeOldest | Op::RevokeNewest => {
                    if open.is_empty() {
                        continue;
                    }
                    let index = if matches!(op, Op::RevokeOldest) { 0 } else { open.len() - 1 };
                    let delta = open.remove(index);
                    let outcome = LedgerService::revoke(
                        &state,
                        ConsumptionId::new(),
                        ConsumptionStatus::Normal,
                        &delta,
                    );
                    prop_assert!(outcome.is_ok(), "revoke failed: {:?}", outcome.err());
                    if let Ok(outcome) = outcome {
                        state = outcome.after;
                    }
                }
                Op::Pay(cents) => {
                    let input = PaymentInput {
                        amount: Money::from_cents(cents),
                        method: PaymentMethod::Cash,
                        payment_type: None,
                    };
                    if let Ok(outcome) = LedgerService::apply_payment(&state, &input) {
                        state = outcome.after;
                    }
                }
            }

            let report = LedgerService::check_invariants(&state);
            prop_assert!(report.is_valid(), "invariant violated: {:?}", report);
            prop_assert!(state.paid_amount <= state.contract_value);
        }
    }

    /// Consume followed by revoke restores lessons, balance and status exactly.
    #[test]
    fn prop_consume_revoke_round_trip(
        value in contract_value(),
        lessons in total_lessons(),
        pre in 0u32..120,
        take in 1u32..120,
    ) {
        let mut state = new_contract(value, lessons);
        let pre = pre % lessons;
        if pre > 0 {
            state = LedgerService::consume(&state, pre, lesson_date()).unwrap().after;
        }
        let take = 1 + (take - 1) % state.remain_lessons;

        let consumed = LedgerService::consume(&state, take, lesson_date()).unwrap();
        let revoked = LedgerService::revoke(
            &consumed.after,
            ConsumptionId::new(),
            ConsumptionStatus::Normal,
            &consumed.delta,
        )
        .unwrap();

        prop_assert_eq!(revoked.after.remain_lessons, state.remain_lessons);
        prop_assert_eq!(revoked.after.used_lessons, state.used_lessons);
        prop_assert_eq!(revoked.after.unearned, state.unearned);
        prop_assert_eq!(revoked.after.status, state.status);
        prop_assert!(revoked.reconciliation.is_none());
    }

    /// Consuming every lesson recognizes exactly the contract value.
    #[test]
    fn prop_full_consumption_recognizes_contract_value(
        value in contract_value(),
        lessons in total_lessons(),
        chunk in 1u32..10,
    ) {
        let mut state = new_contract(value, lessons);
        let mut recognized = Money::ZERO;

        while state.remain_lessons > 0 {
            let n = chunk.min(state.remain_lessons);
            let outcome = LedgerService::consume(&state, n, lesson_date()).unwrap();
            prop_assert!(!outcome.delta.amount.is_negative());
            prop_assert!(outcome.delta.rounding_residue.amount().abs()
                <= Money::ROUNDING_UNIT.amount() * rust_decimal::Decimal::from(n));
            recognized += outcome.delta.amount;
            state = outcome.after;
        }

        prop_assert_eq!(recognized, value);
        prop_assert!(state.unearned.is_zero());
        prop_assert_eq!(state.status, ContractStatus::Completed);
    }

    /// Terminating twice leaves identical state.
    #[test]
    fn prop_terminate_idempotent(
        value in contract_value(),
        lessons in 2u32..120,
        used in 0u32..120,
    ) {
        let mut state = new_contract(value, lessons);
        let used = used % lessons;
        if used > 0 {
            state = LedgerService::consume(&state, used, lesson_date()).unwrap().after;
        }

        let first = LedgerService::terminate(&state).unwrap();
        let second = LedgerService::terminate(&first.after).unwrap();

        prop_assert_eq!(&first.after, &second.after);
        prop_assert!(second.already_terminated);
        prop_assert_eq!(first.released_liability, state.unearned);
        prop_assert_eq!(first.after.used_lessons + first.after.refunded_lessons, lessons);
        prop_assert!(LedgerService::check_invariants(&second.after).is_valid());
    }
}
