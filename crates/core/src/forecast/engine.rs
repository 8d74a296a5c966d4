//! Rolling forecast computation.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use lessonbook_shared::types::Money;
use rust_decimal::Decimal;

use super::alerts::AlertEvaluator;
use super::error::ForecastError;
use super::types::{
    FlowValues, ForecastBucket, ForecastOverride, ForecastParams, ForecastResult, GrowthRates,
    WeeklyActuals, period_key, week_start,
};

/// Largest accepted horizon and history window, in weeks.
pub const MAX_WEEKS: u32 = 52;

/// Weeks per growth comparison window.
const GROWTH_WINDOW: usize = 4;

/// Growth is clamped to `[-0.5, 0.5]`.
const MAX_GROWTH: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Scale kept on the decayed trend weight between buckets.
const DECAY_SCALE: u32 = 10;

/// Engine for rolling weekly cash-flow forecasts.
pub struct ForecastEngine;

impl ForecastEngine {
    /// Checks parameter ranges.
    pub fn validate(params: &ForecastParams) -> Result<(), ForecastError> {
        if !(1..=MAX_WEEKS).contains(&params.horizon_weeks) {
            return Err(ForecastError::InvalidHorizon(params.horizon_weeks));
        }
        if !(1..=MAX_WEEKS).contains(&params.history_weeks) {
            return Err(ForecastError::InvalidHistoryWindow(params.history_weeks));
        }
        if params.trend_decay < Decimal::ZERO || params.trend_decay > Decimal::ONE {
            return Err(ForecastError::InvalidParameter(format!(
                "trend_decay must be between 0 and 1, got {}",
                params.trend_decay
            )));
        }
        if params.max_liability_decline < Decimal::ZERO
            || params.max_liability_decline > Decimal::ONE
        {
            return Err(ForecastError::InvalidParameter(format!(
                "max_liability_decline must be between 0 and 1, got {}",
                params.max_liability_decline
            )));
        }
        if params.liability_floor.is_negative() {
            return Err(ForecastError::InvalidParameter(format!(
                "liability_floor must not be negative, got {}",
                params.liability_floor
            )));
        }
        if params
            .seasonal_multipliers
            .iter()
            .any(|factor| factor.is_sign_negative() && !factor.is_zero())
        {
            return Err(ForecastError::InvalidParameter(
                "seasonal multipliers must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the `[start, end)` date range of the trailing history window.
    #[must_use]
    pub fn history_window(params: &ForecastParams) -> (NaiveDate, NaiveDate) {
        let start = params.anchor_week - Duration::weeks(i64::from(params.history_weeks));
        (start, params.anchor_week)
    }

    /// Aligns weekly actuals onto the history window, filling empty weeks with zeros.
    ///
    /// Actuals outside the window are ignored; several rows for the same week are summed.
    #[must_use]
    pub fn fill_history(params: &ForecastParams, history: &[WeeklyActuals]) -> Vec<FlowValues> {
        let (start, _) = Self::history_window(params);
        let mut weeks = vec![FlowValues::default(); params.history_weeks as usize];

        for actual in history {
            let offset = (week_start(actual.week_start) - start).num_weeks();
            let Ok(index) = usize::try_from(offset) else {
                continue;
            };
            if let Some(slot) = weeks.get_mut(index) {
                slot.inflow += actual.values.inflow;
                slot.outflow += actual.values.outflow;
                slot.revenue += actual.values.revenue;
            }
        }

        weeks
    }

    /// Weekly average of each series, rounded to cents.
    #[must_use]
    pub fn baseline(weeks: &[FlowValues]) -> FlowValues {
        if weeks.is_empty() {
            return FlowValues::default();
        }
        let count = Decimal::from(weeks.len() as u64);
        let average = |total: Money| Money::new(total.amount() / count).round_cents();

        FlowValues {
            inflow: average(weeks.iter().map(|w| w.inflow).sum()),
            outflow: average(weeks.iter().map(|w| w.outflow).sum()),
            revenue: average(weeks.iter().map(|w| w.revenue).sum()),
        }
    }

    /// Growth of the last four weeks over the four before them.
    ///
    /// Zero with fewer than eight weeks of history or a non-positive base.
    #[must_use]
    pub fn growth_rate(series: &[Money]) -> Decimal {
        let len = series.len();
        if len < GROWTH_WINDOW * 2 {
            return Decimal::ZERO;
        }

        let recent: Money = series[len - GROWTH_WINDOW..].iter().sum();
        let previous: Money = series[len - GROWTH_WINDOW * 2..len - GROWTH_WINDOW]
            .iter()
            .sum();
        if !previous.is_positive() {
            return Decimal::ZERO;
        }

        let growth = (recent - previous).amount() / previous.amount();
        growth.clamp(-MAX_GROWTH, MAX_GROWTH)
    }

    /// Per-series growth rates over filled history.
    #[must_use]
    pub fn growth_rates(weeks: &[FlowValues]) -> GrowthRates {
        let inflow: Vec<Money> = weeks.iter().map(|w| w.inflow).collect();
        let outflow: Vec<Money> = weeks.iter().map(|w| w.outflow).collect();
        let revenue: Vec<Money> = weeks.iter().map(|w| w.revenue).collect();
        GrowthRates {
            inflow: Self::growth_rate(&inflow),
            outflow: Self::growth_rate(&outflow),
            revenue: Self::growth_rate(&revenue),
        }
    }

    /// Trend multiplier `1 + growth * weight`, where `weight = decay^(k+1)`.
    #[must_use]
    pub fn trend_factor(growth: Decimal, weight: Decimal) -> Decimal {
        Decimal::ONE + growth * weight
    }

    /// Seasonal multiplier for the calendar month of `date`.
    #[must_use]
    pub fn seasonal_factor(params: &ForecastParams, date: NaiveDate) -> Decimal {
        params.seasonal_multipliers[date.month0() as usize]
    }

    /// Runs a forecast.
    ///
    /// `overrides` may contain entries for other locations or periods; only those
    /// matching the run's location and a forecast bucket are applied.
    pub fn run(
        params: &ForecastParams,
        history: &[WeeklyActuals],
        overrides: &[ForecastOverride],
        starting_liability: Money,
    ) -> Result<ForecastResult, ForecastError> {
        Self::validate(params)?;

        let weeks = Self::fill_history(params, history);
        let base = Self::baseline(&weeks);
        let growth = Self::growth_rates(&weeks);

        let by_period: HashMap<&str, &ForecastOverride> = overrides
            .iter()
            .filter(|o| o.location_id == params.location_id)
            .map(|o| (o.period_key.as_str(), o))
            .collect();

        let mut buckets = Vec::with_capacity(params.horizon_weeks as usize);
        let mut weight = params.trend_decay;
        let mut cumulative_net = Money::ZERO;
        let mut liability = starting_liability.max_zero();

        for k in 0..params.horizon_weeks {
            let start = params.anchor_week + Duration::weeks(i64::from(k));
            let key = period_key(start);
            let seasonal = Self::seasonal_factor(params, start);
            let project = |base: Money, growth: Decimal| {
                base.scale(seasonal * Self::trend_factor(growth, weight))
                    .round_cents()
                    .max_zero()
            };

            let system = FlowValues {
                inflow: project(base.inflow, growth.inflow),
                outflow: project(base.outflow, growth.outflow),
                revenue: project(base.revenue, growth.revenue),
            };

            let manual = by_period.get(key.as_str()).copied();
            let effective = manual.map_or(system, |o| o.values.apply(system));

            let net = effective.net_cash();
            cumulative_net += net;
            liability = (liability + effective.inflow - effective.revenue - effective.outflow)
                .max_zero();

            buckets.push(ForecastBucket {
                period_key: key,
                week_start: start,
                week_end: start + Duration::days(6),
                seasonal_factor: seasonal,
                trend_factor: Self::trend_factor(growth.inflow, weight),
                system,
                override_values: manual.map(|o| o.values),
                locked: manual.is_some_and(|o| o.locked),
                effective,
                net_cash_flow: net,
                cumulative_net,
                liability_balance: liability,
            });

            weight = (weight * params.trend_decay).round_dp(DECAY_SCALE);
        }

        let alerts =
            AlertEvaluator::evaluate(params, &buckets, starting_liability.max_zero(), base.inflow);

        Ok(ForecastResult {
            params: params.clone(),
            base,
            growth,
            starting_liability: starting_liability.max_zero(),
            buckets,
            alerts,
            cached: false,
        })
    }
}
