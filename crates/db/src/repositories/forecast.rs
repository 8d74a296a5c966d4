//! Forecast repository: weekly history, overrides and cached runs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDate, Utc};
use lessonbook_core::forecast::{
    FlowValues, ForecastCache, ForecastEngine, ForecastError, ForecastOverride, ForecastParams,
    ForecastRequest, ForecastResult, OverrideService, SetOverrideInput, WeeklyActuals, period_key,
};
use lessonbook_core::sequence::business_date;
use lessonbook_shared::config::ForecastConfig;
use lessonbook_shared::types::{LocationId, Money, OperatorId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::LedgerContext;
use super::contract::liability_summary;
use super::convert::forecast_override;
use crate::entities::forecast_overrides;

fn forecast_db_error(err: DbErr) -> ForecastError {
    ForecastError::Database(err.to_string())
}

fn location_column(location_id: Option<LocationId>) -> Uuid {
    location_id.unwrap_or_else(LocationId::nil).into_inner()
}

/// Forecast repository.
///
/// Runs are cached by input fingerprint; override edits clear the cache.
#[derive(Clone)]
pub struct ForecastRepository {
    db: DatabaseConnection,
    ctx: LedgerContext,
    config: ForecastConfig,
    cache: ForecastCache,
}

impl fmt::Debug for ForecastRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastRepository")
            .field("config", &self.config)
            .field("cached_runs", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl ForecastRepository {
    /// Creates a new forecast repository with a cache sized from `config`.
    #[must_use]
    pub fn new(db: DatabaseConnection, ctx: LedgerContext, config: ForecastConfig) -> Self {
        let cache = ForecastCache::from_config(&config);
        Self {
            db,
            ctx,
            config,
            cache,
        }
    }

    /// Runs a forecast anchored on the current business week unless the
    /// request names another date.
    pub async fn run(&self, request: &ForecastRequest) -> Result<ForecastResult, ForecastError> {
        let today = business_date(Utc::now(), self.ctx.timezone);
        let params = ForecastParams::resolve(request, &self.config, today);
        ForecastEngine::validate(&params)?;

        let history = self.weekly_history(&params).await?;
        let overrides = self.bucket_overrides(&params).await?;
        let starting_liability = liability_summary(&self.db, params.location_id)
            .await
            .map_err(|err| ForecastError::Database(err.to_string()))?
            .total_unearned;

        let result = self
            .cache
            .run_cached(&params, &history, &overrides, starting_liability)?;

        info!(
            anchor_week = %params.anchor_week,
            horizon_weeks = params.horizon_weeks,
            location_id = ?params.location_id,
            starting_liability = %starting_liability,
            alerts = result.alerts.len(),
            cached = result.cached,
            "Forecast generated"
        );
        Ok(result)
    }

    /// Weekly inflow, outflow and recognized revenue over the history window.
    ///
    /// Cash flows are bucketed by their business-timezone date, revenue by
    /// lesson date. Revoked consumptions are excluded.
    ///
    /// Daily settlement counts revenue on the day a record was written
    /// instead, so a lesson entered late lands in a different week here
    /// than in the settlement reports.
    async fn weekly_history(
        &self,
        params: &ForecastParams,
    ) -> Result<Vec<WeeklyActuals>, ForecastError> {
        #[derive(Debug, FromQueryResult)]
        struct CashRow {
            week_start: NaiveDate,
            inflow: Decimal,
            outflow: Decimal,
        }

        #[derive(Debug, FromQueryResult)]
        struct RevenueRow {
            week_start: NaiveDate,
            revenue: Decimal,
        }

        let (from, to) = ForecastEngine::history_window(params);
        let location = params.location_id.map(LocationId::into_inner);

        let cash = CashRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            SELECT
                date_trunc('week', occurred_at AT TIME ZONE $1)::date AS week_start,
                COALESCE(SUM(amount) FILTER (WHERE direction = 'INFLOW'), 0) AS inflow,
                COALESCE(SUM(amount) FILTER (WHERE direction = 'OUTFLOW'), 0) AS outflow
            FROM cash_flow_events
            WHERE (occurred_at AT TIME ZONE $1)::date >= $2
              AND (occurred_at AT TIME ZONE $1)::date < $3
              AND ($4::uuid IS NULL OR location_id = $4)
            GROUP BY 1
            ORDER BY 1
            ",
            [
                self.ctx.timezone.name().into(),
                from.into(),
                to.into(),
                location.into(),
            ],
        ))
        .all(&self.db)
        .await
        .map_err(forecast_db_error)?;

        let revenue = RevenueRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            SELECT
                date_trunc('week', lesson_date::timestamp)::date AS week_start,
                COALESCE(SUM(amount), 0) AS revenue
            FROM consumption_records
            WHERE status = 'NORMAL'
              AND lesson_date >= $1
              AND lesson_date < $2
              AND ($3::uuid IS NULL OR location_id = $3)
            GROUP BY 1
            ORDER BY 1
            ",
            [from.into(), to.into(), location.into()],
        ))
        .all(&self.db)
        .await
        .map_err(forecast_db_error)?;

        let mut weeks: BTreeMap<NaiveDate, FlowValues> = BTreeMap::new();
        for row in cash {
            let week = weeks.entry(row.week_start).or_default();
            week.inflow += Money::new(row.inflow);
            week.outflow += Money::new(row.outflow);
        }
        for row in revenue {
            weeks.entry(row.week_start).or_default().revenue += Money::new(row.revenue);
        }

        debug!(from = %from, to = %to, weeks = weeks.len(), "Loaded forecast history");
        Ok(weeks
            .into_iter()
            .map(|(week_start, values)| WeeklyActuals { week_start, values })
            .collect())
    }

    /// Overrides for the run's location whose bucket falls in the horizon.
    async fn bucket_overrides(
        &self,
        params: &ForecastParams,
    ) -> Result<Vec<ForecastOverride>, ForecastError> {
        let last_week =
            params.anchor_week + Duration::weeks(i64::from(params.horizon_weeks.saturating_sub(1)));

        let rows = forecast_overrides::Entity::find()
            .filter(forecast_overrides::Column::LocationId.eq(location_column(params.location_id)))
            .filter(
                forecast_overrides::Column::PeriodKey
                    .between(period_key(params.anchor_week), period_key(last_week)),
            )
            .order_by_asc(forecast_overrides::Column::PeriodKey)
            .all(&self.db)
            .await
            .map_err(forecast_db_error)?;

        Ok(rows.iter().map(forecast_override).collect())
    }

    /// Lists stored overrides for a location, or the ledger-wide ones for `None`.
    pub async fn list_overrides(
        &self,
        location_id: Option<LocationId>,
    ) -> Result<Vec<forecast_overrides::Model>, ForecastError> {
        forecast_overrides::Entity::find()
            .filter(forecast_overrides::Column::LocationId.eq(location_column(location_id)))
            .order_by_asc(forecast_overrides::Column::PeriodKey)
            .all(&self.db)
            .await
            .map_err(forecast_db_error)
    }

    /// Creates or replaces the override for a bucket.
    ///
    /// Locked buckets are refused, including one locked by a concurrent call.
    pub async fn set_override(
        &self,
        input: SetOverrideInput,
    ) -> Result<forecast_overrides::Model, ForecastError> {
        OverrideService::parse_period_key(&input.period_key)?;
        let location = location_column(input.location_id);
        let txn = self.db.begin().await.map_err(forecast_db_error)?;

        let existing = find_override(&txn, &input.period_key, location).await?;
        let key = input.period_key.clone();
        let current = existing.as_ref().map(forecast_override);
        let validated = OverrideService::set(current.as_ref(), input)?;

        let now = Utc::now();
        let active = forecast_overrides::ActiveModel {
            id: Set(Uuid::now_v7()),
            period_key: Set(validated.period_key.clone()),
            location_id: Set(location),
            inflow: Set(validated.values.inflow.map(Money::amount)),
            outflow: Set(validated.values.outflow.map(Money::amount)),
            revenue: Set(validated.values.revenue.map(Money::amount)),
            reason: Set(validated.reason.clone()),
            locked: Set(false),
            updated_by: Set(validated.updated_by.into_inner()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let model = forecast_overrides::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    forecast_overrides::Column::PeriodKey,
                    forecast_overrides::Column::LocationId,
                ])
                .update_columns([
                    forecast_overrides::Column::Inflow,
                    forecast_overrides::Column::Outflow,
                    forecast_overrides::Column::Revenue,
                    forecast_overrides::Column::Reason,
                    forecast_overrides::Column::UpdatedBy,
                    forecast_overrides::Column::UpdatedAt,
                ])
                .action_and_where(
                    Expr::col((forecast_overrides::Entity, forecast_overrides::Column::Locked))
                        .eq(false),
                )
                .to_owned(),
            )
            .exec_with_returning(&txn)
            .await
            .map_err(|err| match err {
                DbErr::RecordNotInserted | DbErr::RecordNotFound(_) => ForecastError::Locked {
                    period_key: key.clone(),
                },
                other => forecast_db_error(other),
            })?;

        txn.commit().await.map_err(forecast_db_error)?;
        self.cache.invalidate_all();

        info!(
            period_key = %model.period_key,
            location_id = ?validated.location_id,
            inflow = ?model.inflow,
            outflow = ?model.outflow,
            revenue = ?model.revenue,
            "Forecast override saved"
        );
        Ok(model)
    }

    /// Locks a bucket's override against further edits.
    pub async fn lock_override(
        &self,
        period_key: &str,
        location_id: Option<LocationId>,
        operator: OperatorId,
    ) -> Result<forecast_overrides::Model, ForecastError> {
        OverrideService::parse_period_key(period_key)?;
        let location = location_column(location_id);
        let txn = self.db.begin().await.map_err(forecast_db_error)?;

        let existing = find_override(&txn, period_key, location).await?;
        let already_locked = existing.as_ref().is_some_and(|row| row.locked);
        let locked = OverrideService::lock(
            existing.as_ref().map(forecast_override),
            period_key,
            operator,
        )?;

        let model = match existing {
            Some(row) if !already_locked => {
                let mut active: forecast_overrides::ActiveModel = row.into();
                active.locked = Set(true);
                active.updated_by = Set(locked.updated_by.into_inner());
                active.updated_at = Set(Utc::now().into());
                active.update(&txn).await.map_err(forecast_db_error)?
            }
            Some(row) => row,
            None => {
                return Err(ForecastError::OverrideNotFound {
                    period_key: period_key.to_string(),
                });
            }
        };

        txn.commit().await.map_err(forecast_db_error)?;
        if !already_locked {
            self.cache.invalidate_all();
            info!(period_key, location_id = ?location_id, "Forecast period locked");
        }
        Ok(model)
    }
}

async fn find_override<C: ConnectionTrait>(
    conn: &C,
    period_key: &str,
    location: Uuid,
) -> Result<Option<forecast_overrides::Model>, ForecastError> {
    forecast_overrides::Entity::find()
        .filter(forecast_overrides::Column::PeriodKey.eq(period_key))
        .filter(forecast_overrides::Column::LocationId.eq(location))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(forecast_db_error)
}
