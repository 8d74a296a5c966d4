//! Contract ledger domain types.

use std::fmt;

use chrono::NaiveDate;
use lessonbook_shared::types::{
    ContractId, CustomerId, LocationId, Money, OperatorId, PackageId,
};
use serde::{Deserialize, Serialize};

/// Contract lifecycle status.
///
/// Valid transitions:
/// - Active → Completed (remaining lessons reach 0)
/// - Active → Terminated (refund completes)
/// - Completed → Active (a revocation restores lessons)
///
/// Nothing leaves Terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Lessons may be consumed.
    Active,
    /// All lessons consumed.
    Completed,
    /// Closed by a refund.
    Terminated,
}

impl ContractStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Terminated => "TERMINATED",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            "TERMINATED" => Some(Self::Terminated),
            _ => None,
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How money was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the front desk.
    Cash,
    /// Bank or credit card.
    Card,
    /// Bank transfer.
    BankTransfer,
    /// Online wallet.
    Online,
    /// Anything else.
    Other,
}

/// Why a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// First payment at signing.
    InitialSign,
    /// Subsequent part payment.
    Installment,
    /// Payment recorded as a renewal.
    Renewal,
}

/// Catalog data frozen into the contract when it is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    /// Package id.
    pub package_id: PackageId,
    /// Package name at signing.
    pub package_name: String,
    /// Package lesson count at signing.
    pub total_lessons: u32,
    /// Package list price at signing.
    pub total_price: Money,
    /// Package validity at signing.
    pub validity_days: u32,
    /// Customer name at signing.
    pub customer_name: String,
    /// Location name at signing.
    pub location_name: String,
}

/// The mutable ledger part of a contract.
///
/// Every ledger primitive takes one of these and returns the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    /// Contract id.
    pub id: ContractId,
    /// Lessons purchased.
    pub total_lessons: u32,
    /// Lessons consumed.
    pub used_lessons: u32,
    /// Lessons still available.
    pub remain_lessons: u32,
    /// Lessons surrendered by a refund (non-zero only once terminated).
    pub refunded_lessons: u32,
    /// Original price minus discount.
    pub contract_value: Money,
    /// Contract value per lesson, four decimals.
    pub unit_price: Money,
    /// Money received so far.
    pub paid_amount: Money,
    /// Liability not yet recognized as revenue.
    pub unearned: Money,
    /// Lifecycle status.
    pub status: ContractStatus,
    /// Last day lessons may be consumed.
    pub end_date: NaiveDate,
    /// Optimistic concurrency counter.
    pub version: i64,
}

/// Input for signing a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContractInput {
    /// Buyer.
    pub customer_id: CustomerId,
    /// Package sold.
    pub package_id: PackageId,
    /// Selling campus.
    pub location_id: LocationId,
    /// Discount off the package price.
    #[serde(default)]
    pub discount: Money,
    /// First day of validity.
    pub start_date: NaiveDate,
    /// Payment taken at signing, if any.
    #[serde(default)]
    pub initial_payment: Option<PaymentInput>,
    /// Acting staff member.
    pub operator: OperatorId,
}

/// A payment to apply to a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    /// Amount received.
    pub amount: Money,
    /// How it was received.
    pub method: PaymentMethod,
    /// Explicit payment type; derived from the contract when absent.
    #[serde(default)]
    pub payment_type: Option<PaymentType>,
}

/// A contract ready to persist.
#[derive(Debug, Clone)]
pub struct NewContract {
    /// Ledger state at signing.
    pub state: ContractState,
    /// Buyer.
    pub customer_id: CustomerId,
    /// Package sold.
    pub package_id: PackageId,
    /// Selling campus.
    pub location_id: LocationId,
    /// Package list price.
    pub original_price: Money,
    /// Discount granted.
    pub discount: Money,
    /// First day of validity.
    pub start_date: NaiveDate,
    /// Frozen catalog data.
    pub snapshot: ContractSnapshot,
}

/// Result of applying a payment.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// Contract after the payment.
    pub after: ContractState,
    /// Amount applied.
    pub amount: Money,
    /// Resolved payment type.
    pub payment_type: PaymentType,
    /// True when this payment funded a contract with nothing paid yet.
    pub first_funding: bool,
}

/// Status of a consumption record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionStatus {
    /// Counts toward revenue.
    Normal,
    /// Reversed; kept for audit.
    Revoked,
}

impl ConsumptionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Revoked => "REVOKED",
        }
    }
}

impl fmt::Display for ConsumptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact before/after snapshot of one consumption, stored for reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    /// Lessons consumed.
    pub lessons: u32,
    /// Unit price at the time of consumption.
    pub unit_price: Money,
    /// Liability released into revenue.
    pub amount: Money,
    /// `amount` minus `unit_price * lessons` rounded to cents.
    pub rounding_residue: Money,
    /// Remaining lessons before.
    pub remain_before: u32,
    /// Remaining lessons after.
    pub remain_after: u32,
    /// Unearned balance before.
    pub unearned_before: Money,
    /// Unearned balance after.
    pub unearned_after: Money,
}

/// Result of consuming lessons.
#[derive(Debug, Clone)]
pub struct ConsumptionOutcome {
    /// Contract after consumption.
    pub after: ContractState,
    /// Snapshot to store on the consumption record.
    pub delta: LedgerDelta,
    /// True when this consumption completed the contract.
    pub completed: bool,
}

/// Result of revoking a consumption.
#[derive(Debug, Clone)]
pub struct RevocationOutcome {
    /// Contract after revocation.
    pub after: ContractState,
    /// Lessons given back.
    pub restored_lessons: u32,
    /// Liability given back.
    pub restored_amount: Money,
    /// True when a completed contract became active again.
    pub reopened: bool,
    /// Adjustment applied to land on the canonical liability, if any.
    pub reconciliation: Option<Money>,
}

/// Result of terminating a contract.
#[derive(Debug, Clone)]
pub struct TerminationOutcome {
    /// Contract after termination.
    pub after: ContractState,
    /// Lessons surrendered.
    pub refunded_lessons: u32,
    /// Liability extinguished.
    pub released_liability: Money,
    /// True when the contract was already terminated (no-op).
    pub already_terminated: bool,
}

/// Result of checking a contract's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    /// Contract checked.
    pub contract_id: ContractId,
    /// `used + remain + refunded == total`.
    pub lessons_balanced: bool,
    /// `unearned` within one cent of the canonical liability.
    pub liability_consistent: bool,
    /// `unearned` agrees with `unit_price * remain` within the unit-price tolerance.
    pub unit_price_consistent: bool,
    /// No negative balances.
    pub non_negative: bool,
    /// Status agrees with the remaining lessons.
    pub status_consistent: bool,
    /// `unit_price * remain` rounded to cents.
    pub unit_price_liability: Money,
    /// Liability derived from contract value at full precision.
    pub canonical_liability: Money,
    /// `unearned - canonical_liability`.
    pub drift: Money,
}

impl InvariantReport {
    /// True when every check passed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.lessons_balanced
            && self.liability_consistent
            && self.unit_price_consistent
            && self.non_negative
            && self.status_consistent
    }
}

/// Ledger-wide liability totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiabilitySummary {
    /// Contracts with a non-zero liability.
    pub contract_count: u64,
    /// Sum of unearned balances.
    pub total_unearned: Money,
    /// Sum of remaining lessons.
    pub total_remain_lessons: u64,
}
