//! Ledger service: the only legal mutations of a contract's balances.
//!
//! Every function is pure. It takes the current [`ContractState`] and returns
//! the next one together with whatever must be recorded alongside it; the
//! repository layer persists the result inside a single transaction.
//!
//! Liability is always derived from the contract value at full precision:
//! `round_half_up(value * remain / total, 2)`. A consumption releases the
//! difference between two such liabilities, so rounding residue never builds
//! up and the last consumption lands exactly on zero.

use chrono::{Days, NaiveDate};
use lessonbook_shared::types::{ConsumptionId, ContractId, Money};

use super::error::LedgerError;
use super::types::{
    ConsumptionOutcome, ConsumptionStatus, ContractSnapshot, ContractState, ContractStatus,
    CreateContractInput, InvariantReport, LedgerDelta, NewContract, PaymentInput, PaymentOutcome,
    PaymentType, RevocationOutcome, TerminationOutcome,
};
use crate::catalog::{CustomerInfo, LocationInfo, PackageInfo};

/// Stateless ledger service.
///
/// All methods are associated functions; none of them touch storage.
pub struct LedgerService;

impl LedgerService {
    /// Canonical liability of `remain` lessons of this contract.
    #[must_use]
    pub fn liability(state: &ContractState, remain: u32) -> Money {
        state
            .contract_value
            .pro_rata(remain, state.total_lessons)
            .unwrap_or(Money::ZERO)
    }

    /// Validates catalog data and builds a new contract.
    ///
    /// Unearned balance is initialized to the full contract value at signing,
    /// independent of how much has been paid.
    ///
    /// # Errors
    ///
    /// - `LocationInactive` / `PackageNotOnSale` when the catalog forbids the sale
    /// - `PackageWithoutLessons` for an empty package
    /// - `InvalidDiscount` unless `0 <= discount <= price` in whole cents
    pub fn create_contract(
        input: &CreateContractInput,
        package: &PackageInfo,
        customer: &CustomerInfo,
        location: &LocationInfo,
    ) -> Result<NewContract, LedgerError> {
        if !location.active {
            return Err(LedgerError::LocationInactive(location.id.into_inner()));
        }
        if !package.on_sale {
            return Err(LedgerError::PackageNotOnSale(package.id.into_inner()));
        }
        if package.total_lessons == 0 {
            return Err(LedgerError::PackageWithoutLessons(package.id.into_inner()));
        }
        if input.discount.is_negative()
            || input.discount > package.total_price
            || !input.discount.is_whole_cents()
        {
            return Err(LedgerError::InvalidDiscount {
                discount: input.discount,
                price: package.total_price,
            });
        }

        let contract_value = (package.total_price - input.discount).round_cents();
        let unit_price = contract_value
            .div_lessons(package.total_lessons)
            .ok_or(LedgerError::PackageWithoutLessons(package.id.into_inner()))?;
        let end_date = input
            .start_date
            .checked_add_days(Days::new(u64::from(package.validity_days)))
            .ok_or_else(|| {
                LedgerError::Internal(format!(
                    "validity of {} days overflows the calendar",
                    package.validity_days
                ))
            })?;

        let state = ContractState {
            id: ContractId::new(),
            total_lessons: package.total_lessons,
            used_lessons: 0,
            remain_lessons: package.total_lessons,
            refunded_lessons: 0,
            contract_value,
            unit_price,
            paid_amount: Money::ZERO,
            unearned: contract_value,
            status: ContractStatus::Active,
            end_date,
            version: 0,
        };

        Ok(NewContract {
            state,
            customer_id: customer.id,
            package_id: package.id,
            location_id: location.id,
            original_price: package.total_price,
            discount: input.discount,
            start_date: input.start_date,
            snapshot: ContractSnapshot {
                package_id: package.id,
                package_name: package.name.clone(),
                total_lessons: package.total_lessons,
                total_price: package.total_price,
                validity_days: package.validity_days,
                customer_name: customer.name.clone(),
                location_name: location.name.clone(),
            },
        })
    }

    /// Records money received against a contract.
    ///
    /// # Errors
    ///
    /// - `ContractTerminated` for a terminated contract
    /// - `NonPositivePayment` for zero or negative amounts
    /// - `Overpayment` when paid would exceed the contract value
    pub fn apply_payment(
        state: &ContractState,
        input: &PaymentInput,
    ) -> Result<PaymentOutcome, LedgerError> {
        if state.status == ContractStatus::Terminated {
            return Err(LedgerError::ContractTerminated);
        }
        if !input.amount.is_positive() {
            return Err(LedgerError::NonPositivePayment(input.amount));
        }
        let outstanding = state.contract_value - state.paid_amount;
        if input.amount > outstanding {
            return Err(LedgerError::Overpayment {
                amount: input.amount,
                outstanding,
            });
        }

        let first_funding = state.paid_amount.is_zero();
        let payment_type = input.payment_type.unwrap_or(if first_funding {
            PaymentType::InitialSign
        } else {
            PaymentType::Installment
        });

        let mut after = state.clone();
        after.paid_amount += input.amount.round_cents();
        if first_funding {
            after.unearned = Self::liability(state, state.remain_lessons);
        }
        after.version += 1;

        Ok(PaymentOutcome {
            after,
            amount: input.amount.round_cents(),
            payment_type,
            first_funding,
        })
    }

    /// Converts `lessons` of liability into revenue.
    ///
    /// # Errors
    ///
    /// - `ContractTerminated` / `ContractNotActive` unless the contract is active
    /// - `ZeroLessons` when `lessons == 0`
    /// - `InsufficientBalance` when `lessons > remain_lessons`
    /// - `ContractExpired` when `lesson_date` is after the validity window
    pub fn consume(
        state: &ContractState,
        lessons: u32,
        lesson_date: NaiveDate,
    ) -> Result<ConsumptionOutcome, LedgerError> {
        if state.status == ContractStatus::Terminated {
            return Err(LedgerError::ContractTerminated);
        }
        if lessons == 0 {
            return Err(LedgerError::ZeroLessons);
        }
        if lessons > state.remain_lessons {
            return Err(LedgerError::InsufficientBalance {
                requested: lessons,
                remaining: state.remain_lessons,
            });
        }
        if state.status != ContractStatus::Active {
            return Err(LedgerError::ContractNotActive(state.status));
        }
        if lesson_date > state.end_date {
            return Err(LedgerError::ContractExpired {
                end_date: state.end_date,
                lesson_date,
            });
        }

        let remain_after = state.remain_lessons - lessons;
        let unearned_after = Self::liability(state, remain_after);
        let amount = state.unearned - unearned_after;
        let nominal = state.unit_price.mul_lessons(lessons).round_cents();

        let delta = LedgerDelta {
            lessons,
            unit_price: state.unit_price,
            amount,
            rounding_residue: amount - nominal,
            remain_before: state.remain_lessons,
            remain_after,
            unearned_before: state.unearned,
            unearned_after,
        };

        let completed = remain_after == 0;
        let mut after = state.clone();
        after.used_lessons += lessons;
        after.remain_lessons = remain_after;
        after.unearned = unearned_after;
        if completed {
            after.status = ContractStatus::Completed;
        }
        after.version += 1;

        Ok(ConsumptionOutcome {
            after,
            delta,
            completed,
        })
    }

    /// Reverses a consumption by applying its stored delta.
    ///
    /// The delta is applied as recorded, not recomputed from the current
    /// balance. If other activity since then leaves the restored balance more
    /// than one cent off the canonical liability, it is snapped back and the
    /// adjustment is reported in `reconciliation`.
    ///
    /// # Errors
    ///
    /// - `AlreadyRevoked` for a revoked record
    /// - `ContractTerminated` for a terminated contract
    /// - `InconsistentRecord` when the delta cannot apply to this contract
    pub fn revoke(
        state: &ContractState,
        record_id: ConsumptionId,
        record_status: ConsumptionStatus,
        delta: &LedgerDelta,
    ) -> Result<RevocationOutcome, LedgerError> {
        if record_status == ConsumptionStatus::Revoked {
            return Err(LedgerError::AlreadyRevoked(record_id.into_inner()));
        }
        if state.status == ContractStatus::Terminated {
            return Err(LedgerError::ContractTerminated);
        }

        let lessons = delta
            .remain_before
            .checked_sub(delta.remain_after)
            .ok_or_else(|| {
                LedgerError::InconsistentRecord(format!(
                    "remaining lessons grew from {} to {}",
                    delta.remain_before, delta.remain_after
                ))
            })?;
        let used_lessons = state.used_lessons.checked_sub(lessons).ok_or_else(|| {
            LedgerError::InconsistentRecord(format!(
                "cannot restore {lessons} lessons, only {} used",
                state.used_lessons
            ))
        })?;
        let remain_lessons = state.remain_lessons + lessons;
        if remain_lessons > state.total_lessons {
            return Err(LedgerError::InconsistentRecord(format!(
                "restoring {lessons} lessons exceeds total {}",
                state.total_lessons
            )));
        }

        let restored_amount = delta.unearned_before - delta.unearned_after;
        let restored = state.unearned + restored_amount;
        let canonical = Self::liability(state, remain_lessons);
        let (unearned, reconciliation) = if restored.approx_eq(canonical, Money::ROUNDING_UNIT) {
            (restored, None)
        } else {
            (canonical, Some(canonical - restored))
        };

        let reopened = state.status == ContractStatus::Completed && lessons > 0;
        let mut after = state.clone();
        after.used_lessons = used_lessons;
        after.remain_lessons = remain_lessons;
        after.unearned = unearned;
        if reopened {
            after.status = ContractStatus::Active;
        }
        after.version += 1;

        Ok(RevocationOutcome {
            after,
            restored_lessons: lessons,
            restored_amount,
            reopened,
            reconciliation,
        })
    }

    /// Closes a contract after its refund settles.
    ///
    /// Calling this on an already terminated contract returns the current
    /// state unchanged with `already_terminated` set.
    ///
    /// # Errors
    ///
    /// `ContractNotActive` for a completed contract.
    pub fn terminate(state: &ContractState) -> Result<TerminationOutcome, LedgerError> {
        match state.status {
            ContractStatus::Terminated => Ok(TerminationOutcome {
                after: state.clone(),
                refunded_lessons: 0,
                released_liability: Money::ZERO,
                already_terminated: true,
            }),
            ContractStatus::Completed => Err(LedgerError::ContractNotActive(state.status)),
            ContractStatus::Active => {
                let mut after = state.clone();
                after.refunded_lessons = state.remain_lessons;
                after.remain_lessons = 0;
                after.unearned = Money::ZERO;
                after.status = ContractStatus::Terminated;
                after.version += 1;

                Ok(TerminationOutcome {
                    after,
                    refunded_lessons: state.remain_lessons,
                    released_liability: state.unearned,
                    already_terminated: false,
                })
            }
        }
    }

    /// Checks the per-contract invariants.
    ///
    /// `unearned` must sit within one cent of the canonical liability. The
    /// `unit_price * remain` form is checked too, but against
    /// [`Money::unit_price_tolerance`]: the unit price is stored to four
    /// places, so on large packages it drifts from the canonical value by
    /// more than a cent without anything being wrong.
    #[must_use]
    pub fn check_invariants(state: &ContractState) -> InvariantReport {
        let lessons_balanced = u64::from(state.used_lessons)
            + u64::from(state.remain_lessons)
            + u64::from(state.refunded_lessons)
            == u64::from(state.total_lessons);

        let canonical = match state.status {
            ContractStatus::Terminated => Money::ZERO,
            _ => Self::liability(state, state.remain_lessons),
        };
        let unit_price_liability = state
            .unit_price
            .mul_lessons(state.remain_lessons)
            .round_cents();

        let non_negative = !state.unearned.is_negative()
            && !state.paid_amount.is_negative()
            && !state.contract_value.is_negative();

        let status_consistent = match state.status {
            ContractStatus::Active => state.remain_lessons > 0 && state.refunded_lessons == 0,
            ContractStatus::Completed => {
                state.remain_lessons == 0 && state.refunded_lessons == 0
            }
            ContractStatus::Terminated => state.remain_lessons == 0 && state.unearned.is_zero(),
        };

        InvariantReport {
            contract_id: state.id,
            lessons_balanced,
            liability_consistent: state.unearned.approx_eq(canonical, Money::ROUNDING_UNIT),
            unit_price_consistent: state.unearned.approx_eq(
                unit_price_liability,
                Money::unit_price_tolerance(state.remain_lessons),
            ),
            non_negative,
            status_consistent,
            unit_price_liability,
            canonical_liability: canonical,
            drift: state.unearned - canonical,
        }
    }
}
