//! Settlement repository: daily per-location reports.

use chrono::{NaiveDate, Utc};
use lessonbook_core::events::{LedgerEvent, publish_all};
use lessonbook_core::settlement::{
    SettleInput, SettlementError, SettlementService, SettlementTotals,
};
use lessonbook_shared::types::{LocationId, SettlementId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use tracing::info;

use super::LedgerContext;
use super::convert::{cash_flow_event, consumption_fact, settlement_report};
use crate::entities::{cash_flow_events, consumption_records, locations, settlement_reports};

/// Reports for a date range with their sum.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementRange {
    /// Reports, oldest first.
    pub reports: Vec<settlement_reports::Model>,
    /// Sum over `reports`.
    pub summary: SettlementTotals,
}

fn settlement_db_error(err: DbErr) -> SettlementError {
    SettlementError::Database(err.to_string())
}

/// Settlement repository.
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    db: DatabaseConnection,
    ctx: LedgerContext,
}

impl SettlementRepository {
    /// Creates a new settlement repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, ctx: LedgerContext) -> Self {
        Self { db, ctx }
    }

    /// Settles one business day for one location.
    ///
    /// Aggregates the day's cash flows and consumptions and stores the report.
    /// A day settles once; a racing second call loses on the unique index.
    pub async fn settle(
        &self,
        input: SettleInput,
    ) -> Result<settlement_reports::Model, SettlementError> {
        let location_id = input.location_id.into_inner();
        let bounds = SettlementService::day_bounds(input.date, self.ctx.timezone)?;

        let txn = self.db.begin().await.map_err(settlement_db_error)?;

        locations::Entity::find_by_id(location_id)
            .one(&txn)
            .await
            .map_err(settlement_db_error)?
            .ok_or(SettlementError::LocationNotFound(location_id))?;

        let existing = settlement_reports::Entity::find()
            .filter(settlement_reports::Column::SettleDate.eq(input.date))
            .filter(settlement_reports::Column::LocationId.eq(location_id))
            .one(&txn)
            .await
            .map_err(settlement_db_error)?
            .map(|report| SettlementId::from_uuid(report.id));

        let flows: Vec<_> = cash_flow_events::Entity::find()
            .filter(cash_flow_events::Column::LocationId.eq(location_id))
            .filter(cash_flow_events::Column::OccurredAt.gte(bounds.start))
            .filter(cash_flow_events::Column::OccurredAt.lt(bounds.end))
            .all(&txn)
            .await
            .map_err(settlement_db_error)?
            .iter()
            .map(cash_flow_event)
            .collect();

        let facts = consumption_records::Entity::find()
            .filter(consumption_records::Column::LocationId.eq(location_id))
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(consumption_records::Column::CreatedAt.gte(bounds.start))
                            .add(consumption_records::Column::CreatedAt.lt(bounds.end)),
                    )
                    .add(
                        Condition::all()
                            .add(consumption_records::Column::RevokedAt.gte(bounds.start))
                            .add(consumption_records::Column::RevokedAt.lt(bounds.end)),
                    ),
            )
            .all(&txn)
            .await
            .map_err(settlement_db_error)?
            .iter()
            .map(consumption_fact)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SettlementError::Internal(err.to_string()))?;

        let totals = SettlementService::aggregate(&bounds, &flows, &facts);
        let report = SettlementService::settle(existing, input, totals, Utc::now())?;
        let t = &report.totals;

        let model = settlement_reports::ActiveModel {
            id: Set(report.id.into_inner()),
            settle_date: Set(report.settle_date),
            location_id: Set(location_id),
            payment_count: Set(count_column(t.payment_count)?),
            payment_total: Set(t.payment_total.amount()),
            refund_count: Set(count_column(t.refund_count)?),
            refund_total: Set(t.refund_total.amount()),
            net_cash: Set(t.net_cash.amount()),
            consumption_count: Set(count_column(t.consumption_count)?),
            lessons_consumed: Set(count_column(t.lessons_consumed)?),
            recognized_revenue: Set(t.recognized_revenue.amount()),
            revoked_count: Set(count_column(t.revoked_count)?),
            settled_by: Set(report.settled_by.into_inner()),
            settled_at: Set(report.settled_at.into()),
        }
        .insert(&txn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => SettlementError::AlreadySettled {
                date: report.settle_date,
                location_id,
            },
            _ => settlement_db_error(err),
        })?;

        txn.commit().await.map_err(settlement_db_error)?;

        info!(
            settlement_id = %model.id,
            location_id = %location_id,
            date = %model.settle_date,
            payments = model.payment_count,
            refunds = model.refund_count,
            net_cash = %model.net_cash,
            recognized_revenue = %model.recognized_revenue,
            "Day settled"
        );
        publish_all(
            self.ctx.events.as_ref(),
            &[LedgerEvent::DaySettled {
                settlement_id: report.id,
                location_id: report.location_id,
                date: report.settle_date,
            }],
        )
        .await;

        Ok(model)
    }

    /// Gets the report for one day and location.
    pub async fn get(
        &self,
        date: NaiveDate,
        location_id: LocationId,
    ) -> Result<settlement_reports::Model, SettlementError> {
        settlement_reports::Entity::find()
            .filter(settlement_reports::Column::SettleDate.eq(date))
            .filter(settlement_reports::Column::LocationId.eq(location_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(settlement_db_error)?
            .ok_or(SettlementError::ReportNotFound {
                date,
                location_id: location_id.into_inner(),
            })
    }

    /// Lists a location's reports in `[from, to]` with a summary.
    pub async fn list(
        &self,
        location_id: LocationId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<SettlementRange, SettlementError> {
        SettlementService::validate_range(from, to)?;

        let reports = settlement_reports::Entity::find()
            .filter(settlement_reports::Column::LocationId.eq(location_id.into_inner()))
            .filter(settlement_reports::Column::SettleDate.between(from, to))
            .order_by_asc(settlement_reports::Column::SettleDate)
            .all(&self.db)
            .await
            .map_err(settlement_db_error)?;

        let summary = SettlementService::summarize(
            &reports.iter().map(settlement_report).collect::<Vec<_>>(),
        );
        Ok(SettlementRange { reports, summary })
    }
}

fn count_column(value: u64) -> Result<i64, SettlementError> {
    i64::try_from(value)
        .map_err(|_| SettlementError::Internal(format!("count {value} overflows BIGINT")))
}
