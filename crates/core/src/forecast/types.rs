//! Rolling forecast domain types.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use lessonbook_shared::config::ForecastConfig;
use lessonbook_shared::types::{LocationId, Money, OperatorId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inflow, outflow and recognized revenue for one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowValues {
    /// Cash received (payments).
    pub inflow: Money,
    /// Cash returned (refund completions).
    pub outflow: Money,
    /// Liability recognized as revenue (consumptions).
    pub revenue: Money,
}

impl FlowValues {
    /// `inflow - outflow`.
    #[must_use]
    pub fn net_cash(&self) -> Money {
        self.inflow - self.outflow
    }
}

/// Historical totals for one ISO week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeeklyActuals {
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Totals for the week.
    pub values: FlowValues,
}

/// Replacement values for one bucket. `None` keeps the system value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverrideValues {
    /// Replacement inflow.
    #[serde(default)]
    pub inflow: Option<Money>,
    /// Replacement outflow.
    #[serde(default)]
    pub outflow: Option<Money>,
    /// Replacement revenue.
    #[serde(default)]
    pub revenue: Option<Money>,
}

impl OverrideValues {
    /// Returns true when no value is replaced.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inflow.is_none() && self.outflow.is_none() && self.revenue.is_none()
    }

    /// Applies the replacements to the system values.
    #[must_use]
    pub fn apply(&self, system: FlowValues) -> FlowValues {
        FlowValues {
            inflow: self.inflow.unwrap_or(system.inflow),
            outflow: self.outflow.unwrap_or(system.outflow),
            revenue: self.revenue.unwrap_or(system.revenue),
        }
    }
}

/// A persisted manual override for one (bucket, location).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastOverride {
    /// ISO week key, `YYYY-Www`.
    pub period_key: String,
    /// Location, `None` for the ledger-wide forecast.
    pub location_id: Option<LocationId>,
    /// Replacement values.
    pub values: OverrideValues,
    /// Why the override was set.
    pub reason: Option<String>,
    /// Locked overrides reject further changes.
    pub locked: bool,
    /// Last editor.
    pub updated_by: OperatorId,
}

/// Input for setting an override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOverrideInput {
    /// ISO week key, `YYYY-Www`.
    pub period_key: String,
    /// Location, `None` for the ledger-wide forecast.
    #[serde(default)]
    pub location_id: Option<LocationId>,
    /// Replacement values.
    #[serde(flatten)]
    pub values: OverrideValues,
    /// Why the override is set.
    #[serde(default)]
    pub reason: Option<String>,
    /// Editor.
    pub operator: OperatorId,
}

/// Caller-supplied forecast parameters; anything absent comes from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Any day of the first forecast week (defaults to today).
    #[serde(default)]
    pub anchor_date: Option<NaiveDate>,
    /// Number of weekly buckets.
    #[serde(default)]
    pub horizon_weeks: Option<u32>,
    /// Trailing history window.
    #[serde(default)]
    pub history_weeks: Option<u32>,
    /// Restrict to one location.
    #[serde(default)]
    pub location_id: Option<LocationId>,
    /// Geometric trend decay.
    #[serde(default)]
    pub trend_decay: Option<Decimal>,
    /// Liability floor for alerts.
    #[serde(default)]
    pub liability_floor: Option<Money>,
    /// Maximum liability decline for alerts.
    #[serde(default)]
    pub max_liability_decline: Option<Decimal>,
}

/// Fully resolved forecast parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastParams {
    /// Monday of the first forecast week.
    pub anchor_week: NaiveDate,
    /// Number of weekly buckets.
    pub horizon_weeks: u32,
    /// Trailing history window in weeks.
    pub history_weeks: u32,
    /// Location, `None` for the ledger-wide forecast.
    pub location_id: Option<LocationId>,
    /// Seasonal multiplier per calendar month (`[0]` is January).
    pub seasonal_multipliers: [Decimal; 12],
    /// Geometric trend decay per bucket.
    pub trend_decay: Decimal,
    /// Liability floor for alerts.
    pub liability_floor: Money,
    /// Maximum liability decline versus the anchor for alerts.
    pub max_liability_decline: Decimal,
}

impl ForecastParams {
    /// Resolves a request against configured defaults.
    #[must_use]
    pub fn resolve(request: &ForecastRequest, config: &ForecastConfig, today: NaiveDate) -> Self {
        Self {
            anchor_week: week_start(request.anchor_date.unwrap_or(today)),
            horizon_weeks: request.horizon_weeks.unwrap_or(config.horizon_weeks),
            history_weeks: request.history_weeks.unwrap_or(config.history_weeks),
            location_id: request.location_id,
            seasonal_multipliers: config.monthly_multipliers(),
            trend_decay: request.trend_decay.unwrap_or(config.trend_decay),
            liability_floor: request
                .liability_floor
                .unwrap_or(Money::new(config.liability_floor)),
            max_liability_decline: request
                .max_liability_decline
                .unwrap_or(config.max_liability_decline),
        }
    }
}

/// One forecast week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastBucket {
    /// ISO week key, `YYYY-Www`.
    pub period_key: String,
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Sunday of the week.
    pub week_end: NaiveDate,
    /// Seasonal multiplier applied.
    pub seasonal_factor: Decimal,
    /// Trend multiplier applied to inflow.
    pub trend_factor: Decimal,
    /// System prediction, retained even when overridden.
    pub system: FlowValues,
    /// Manual override, if any.
    pub override_values: Option<OverrideValues>,
    /// Whether the override is locked.
    pub locked: bool,
    /// Values used downstream (override where present, else system).
    pub effective: FlowValues,
    /// `effective.inflow - effective.outflow`.
    pub net_cash_flow: Money,
    /// Running net cash since the anchor.
    pub cumulative_net: Money,
    /// Running liability balance at week end.
    pub liability_balance: Money,
}

/// Alert kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    /// Cumulative net cash flow went negative.
    NegativeCashFlow,
    /// Liability dropped below the floor.
    LiabilityBelowFloor,
    /// Liability declined too far versus the anchor.
    LiabilityDecline,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NegativeCashFlow => "NEGATIVE_CASH_FLOW",
            Self::LiabilityBelowFloor => "LIABILITY_BELOW_FLOOR",
            Self::LiabilityDecline => "LIABILITY_DECLINE",
        })
    }
}

/// Alert severity. `Critical` sorts above `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    /// Needs attention.
    Warning,
    /// Needs action.
    Critical,
}

/// A derived (never stored) forecast alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastAlert {
    /// Kind.
    pub alert_type: AlertType,
    /// Severity.
    pub severity: AlertSeverity,
    /// Worst bucket for this kind.
    pub period_key: String,
    /// Observed value at the worst bucket.
    pub value: Decimal,
    /// Threshold breached.
    pub threshold: Decimal,
    /// Human-readable summary.
    pub message: String,
}

/// Per-series growth rates used for the trend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthRates {
    /// Inflow growth.
    pub inflow: Decimal,
    /// Outflow growth.
    pub outflow: Decimal,
    /// Revenue growth.
    pub revenue: Decimal,
}

/// A complete forecast run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Parameters used.
    pub params: ForecastParams,
    /// Weekly averages over the history window.
    pub base: FlowValues,
    /// Growth rates behind the trend multipliers.
    pub growth: GrowthRates,
    /// Liability at the anchor.
    pub starting_liability: Money,
    /// Forecast weeks in order.
    pub buckets: Vec<ForecastBucket>,
    /// Alerts, most severe first, at most one per type.
    pub alerts: Vec<ForecastAlert>,
    /// Whether this result came from the cache.
    pub cached: bool,
}

/// Returns the Monday of the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Returns the ISO week key (`YYYY-Www`) of `date`.
#[must_use]
pub fn period_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}
