//! Conversions between entity models and core domain types.

use chrono::{DateTime, FixedOffset, Utc};
use lessonbook_core::catalog::{CustomerInfo, LocationInfo, PackageInfo, TeacherInfo};
use lessonbook_core::forecast::{ForecastOverride, OverrideValues};
use lessonbook_core::ledger::{ContractState, LedgerDelta, LedgerError};
use lessonbook_core::refund::RefundCaseState;
use lessonbook_core::settlement::{CashFlowEvent, ConsumptionFact, SettlementReport, SettlementTotals};
use lessonbook_shared::types::{
    CashFlowEventId, ContractId, CustomerId, LocationId, Money, OperatorId, PackageId,
    RefundCaseId, SettlementId, TeacherId,
};
use sea_orm::DbErr;

use crate::entities::sea_orm_active_enums::{
    CashFlowDirection, CashFlowSource, ConsumptionStatus, ConsumptionType, ContractStatus,
    PaymentMethod, PaymentType, RefundStatus, RefundType,
};
use crate::entities::{
    cash_flow_events, consumption_records, contracts, customers, forecast_overrides, locations,
    packages, refund_cases, settlement_reports, teachers,
};

use lessonbook_core::consumption::ConsumptionType as CoreConsumptionType;
use lessonbook_core::ledger::{
    ConsumptionStatus as CoreConsumptionStatus, ContractStatus as CoreContractStatus,
    PaymentMethod as CorePaymentMethod, PaymentType as CorePaymentType,
};
use lessonbook_core::refund::{RefundStatus as CoreRefundStatus, RefundType as CoreRefundType};
use lessonbook_core::settlement::{
    CashFlowDirection as CoreCashFlowDirection, CashFlowSource as CoreCashFlowSource,
};

/// Implements `From` both ways between a database enum and its core twin.
macro_rules! enum_mapping {
    ($db:ident <=> $core:ident { $($variant:ident),+ $(,)? }) => {
        impl From<$core> for $db {
            fn from(value: $core) -> Self {
                match value {
                    $($core::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$db> for $core {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => Self::$variant,)+
                }
            }
        }
    };
}

enum_mapping!(ContractStatus <=> CoreContractStatus { Active, Completed, Terminated });
enum_mapping!(PaymentMethod <=> CorePaymentMethod { Cash, Card, BankTransfer, Online, Other });
enum_mapping!(PaymentType <=> CorePaymentType { InitialSign, Installment, Renewal });
enum_mapping!(ConsumptionType <=> CoreConsumptionType { Normal, AbsenceDeduction, Makeup, Trial });
enum_mapping!(ConsumptionStatus <=> CoreConsumptionStatus { Normal, Revoked });
enum_mapping!(RefundStatus <=> CoreRefundStatus { Pending, Approved, Rejected, Completed, Cancelled });
enum_mapping!(RefundType <=> CoreRefundType { Normal, Transfer, Terminate });
enum_mapping!(CashFlowSource <=> CoreCashFlowSource { Payment, Refund });
enum_mapping!(CashFlowDirection <=> CoreCashFlowDirection { Inflow, Outflow });

/// Maps a database error, turning lost version races into a retryable conflict.
pub(crate) fn ledger_db_error(err: DbErr) -> LedgerError {
    match err {
        DbErr::RecordNotUpdated => LedgerError::ConcurrentModification,
        other => LedgerError::Database(other.to_string()),
    }
}

/// Non-negative counter column to `u32`.
pub(crate) fn lessons(value: i32, column: &str) -> Result<u32, LedgerError> {
    u32::try_from(value)
        .map_err(|_| LedgerError::InconsistentRecord(format!("{column} is negative: {value}")))
}

/// Lesson count to its `INTEGER` column.
pub(crate) fn lessons_column(value: u32) -> Result<i32, LedgerError> {
    i32::try_from(value)
        .map_err(|_| LedgerError::Internal(format!("lesson count {value} out of range")))
}

pub(crate) fn utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub(crate) fn contract_state(model: &contracts::Model) -> Result<ContractState, LedgerError> {
    Ok(ContractState {
        id: ContractId::from_uuid(model.id),
        total_lessons: lessons(model.total_lessons, "total_lessons")?,
        used_lessons: lessons(model.used_lessons, "used_lessons")?,
        remain_lessons: lessons(model.remain_lessons, "remain_lessons")?,
        refunded_lessons: lessons(model.refunded_lessons, "refunded_lessons")?,
        contract_value: Money::new(model.contract_value),
        unit_price: Money::new(model.unit_price),
        paid_amount: Money::new(model.paid_amount),
        unearned: Money::new(model.unearned),
        status: model.status.into(),
        end_date: model.end_date,
        version: model.version,
    })
}

pub(crate) fn ledger_delta(model: &consumption_records::Model) -> Result<LedgerDelta, LedgerError> {
    Ok(LedgerDelta {
        lessons: lessons(model.lessons, "lessons")?,
        unit_price: Money::new(model.unit_price),
        amount: Money::new(model.amount),
        rounding_residue: Money::new(model.rounding_residue),
        remain_before: lessons(model.remain_before, "remain_before")?,
        remain_after: lessons(model.remain_after, "remain_after")?,
        unearned_before: Money::new(model.unearned_before),
        unearned_after: Money::new(model.unearned_after),
    })
}

pub(crate) fn consumption_fact(
    model: &consumption_records::Model,
) -> Result<ConsumptionFact, LedgerError> {
    Ok(ConsumptionFact {
        lessons: lessons(model.lessons, "lessons")?,
        amount: Money::new(model.amount),
        status: model.status.into(),
        created_at: utc(model.created_at),
        revoked_at: model.revoked_at.map(utc),
    })
}

pub(crate) fn refund_case_state(model: &refund_cases::Model) -> RefundCaseState {
    RefundCaseState {
        id: RefundCaseId::from_uuid(model.id),
        contract_id: ContractId::from_uuid(model.contract_id),
        status: model.status.into(),
        refundable_amount: Money::new(model.refundable_amount),
        payable_amount: Money::new(model.payable_amount),
        approved_amount: model.approved_amount.map(Money::new),
    }
}

pub(crate) fn cash_flow_event(model: &cash_flow_events::Model) -> CashFlowEvent {
    CashFlowEvent {
        id: CashFlowEventId::from_uuid(model.id),
        source_type: model.source_type.into(),
        source_id: model.source_id,
        direction: model.direction.into(),
        amount: Money::new(model.amount),
        location_id: LocationId::from_uuid(model.location_id),
        occurred_at: utc(model.occurred_at),
    }
}

pub(crate) fn settlement_report(model: &settlement_reports::Model) -> SettlementReport {
    let count = |value: i64| u64::try_from(value).unwrap_or_default();
    SettlementReport {
        id: SettlementId::from_uuid(model.id),
        settle_date: model.settle_date,
        location_id: LocationId::from_uuid(model.location_id),
        totals: SettlementTotals {
            payment_count: count(model.payment_count),
            payment_total: Money::new(model.payment_total),
            refund_count: count(model.refund_count),
            refund_total: Money::new(model.refund_total),
            net_cash: Money::new(model.net_cash),
            consumption_count: count(model.consumption_count),
            lessons_consumed: count(model.lessons_consumed),
            recognized_revenue: Money::new(model.recognized_revenue),
            revoked_count: count(model.revoked_count),
        },
        settled_by: OperatorId::from_uuid(model.settled_by),
        settled_at: utc(model.settled_at),
    }
}

pub(crate) fn forecast_override(model: &forecast_overrides::Model) -> ForecastOverride {
    ForecastOverride {
        period_key: model.period_key.clone(),
        location_id: LocationId::from_uuid(model.location_id).non_nil(),
        values: OverrideValues {
            inflow: model.inflow.map(Money::new),
            outflow: model.outflow.map(Money::new),
            revenue: model.revenue.map(Money::new),
        },
        reason: model.reason.clone(),
        locked: model.locked,
        updated_by: OperatorId::from_uuid(model.updated_by),
    }
}

pub(crate) fn package_info(model: &packages::Model) -> Result<PackageInfo, LedgerError> {
    Ok(PackageInfo {
        id: PackageId::from_uuid(model.id),
        name: model.name.clone(),
        total_lessons: lessons(model.total_lessons, "total_lessons")?,
        total_price: Money::new(model.total_price),
        validity_days: lessons(model.validity_days, "validity_days")?,
        on_sale: model.on_sale,
    })
}

pub(crate) fn customer_info(model: &customers::Model) -> CustomerInfo {
    CustomerInfo {
        id: CustomerId::from_uuid(model.id),
        name: model.name.clone(),
    }
}

pub(crate) fn location_info(model: &locations::Model) -> LocationInfo {
    LocationInfo {
        id: LocationId::from_uuid(model.id),
        name: model.name.clone(),
        active: model.active,
    }
}

pub(crate) fn teacher_info(model: &teachers::Model) -> TeacherInfo {
    TeacherInfo {
        id: TeacherId::from_uuid(model.id),
        name: model.name.clone(),
        active: model.active,
    }
}
