//! Daily settlement and cash flow types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use lessonbook_shared::types::{CashFlowEventId, LocationId, Money, OperatorId, SettlementId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::ConsumptionStatus;

/// Direction of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashFlowDirection {
    /// Money received.
    Inflow,
    /// Money returned.
    Outflow,
}

/// Record type a cash flow event derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashFlowSource {
    /// A payment record.
    Payment,
    /// A completed refund case.
    Refund,
}

impl CashFlowSource {
    /// Direction implied by the source.
    #[must_use]
    pub const fn direction(self) -> CashFlowDirection {
        match self {
            Self::Payment => CashFlowDirection::Inflow,
            Self::Refund => CashFlowDirection::Outflow,
        }
    }
}

impl fmt::Display for CashFlowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Payment => "PAYMENT",
            Self::Refund => "REFUND",
        })
    }
}

/// Append-only cash movement. At most one exists per `(source_type, source_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowEvent {
    /// Event id.
    pub id: CashFlowEventId,
    /// Originating record type.
    pub source_type: CashFlowSource,
    /// Originating record id.
    pub source_id: Uuid,
    /// Direction.
    pub direction: CashFlowDirection,
    /// Positive amount.
    pub amount: Money,
    /// Contract location.
    pub location_id: LocationId,
    /// When the cash moved.
    pub occurred_at: DateTime<Utc>,
}

impl CashFlowEvent {
    /// Builds the event for a source record.
    #[must_use]
    pub fn from_source(
        source_type: CashFlowSource,
        source_id: Uuid,
        amount: Money,
        location_id: LocationId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CashFlowEventId::new(),
            source_type,
            source_id,
            direction: source_type.direction(),
            amount,
            location_id,
            occurred_at,
        }
    }
}

/// The slice of a consumption record settlement needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionFact {
    /// Lessons deducted.
    pub lessons: u32,
    /// Liability recognized.
    pub amount: Money,
    /// Current status.
    pub status: ConsumptionStatus,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// When the record was revoked, if it was.
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Half-open UTC interval `[start, end)` covering one business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBounds {
    /// First instant of the day.
    pub start: DateTime<Utc>,
    /// First instant of the next day.
    pub end: DateTime<Utc>,
}

impl DayBounds {
    /// Returns true if `at` falls inside the day.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Aggregated activity for one day and location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    /// Number of payments received.
    pub payment_count: u64,
    /// Sum of payments received.
    pub payment_total: Money,
    /// Number of refunds paid out.
    pub refund_count: u64,
    /// Sum of refunds paid out.
    pub refund_total: Money,
    /// `payment_total - refund_total`.
    pub net_cash: Money,
    /// Consumption records written that day and still standing.
    pub consumption_count: u64,
    /// Lessons in those records.
    pub lessons_consumed: u64,
    /// Liability recognized by those records.
    pub recognized_revenue: Money,
    /// Records revoked that day.
    pub revoked_count: u64,
}

/// Immutable snapshot of one day's activity at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Report id.
    pub id: SettlementId,
    /// Business date settled.
    pub settle_date: NaiveDate,
    /// Location settled.
    pub location_id: LocationId,
    /// Aggregates.
    #[serde(flatten)]
    pub totals: SettlementTotals,
    /// Who ran the settlement.
    pub settled_by: OperatorId,
    /// When it ran.
    pub settled_at: DateTime<Utc>,
}

/// Input for running a settlement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettleInput {
    /// Business date.
    pub date: NaiveDate,
    /// Location.
    pub location_id: LocationId,
    /// Operator.
    pub operator: OperatorId,
}
