//! Scenario and property tests for the rolling forecast.

use chrono::{Duration, NaiveDate};
use lessonbook_shared::types::{LocationId, Money, OperatorId};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::engine::ForecastEngine;
use super::types::{
    AlertType, FlowValues, ForecastOverride, ForecastParams, OverrideValues, WeeklyActuals,
};

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn params(horizon: u32) -> ForecastParams {
    ForecastParams {
        anchor_week: anchor(),
        horizon_weeks: horizon,
        history_weeks: 8,
        location_id: None,
        seasonal_multipliers: [Decimal::ONE; 12],
        trend_decay: dec!(0.85),
        liability_floor: Money::ZERO,
        max_liability_decline: dec!(0.30),
    }
}

fn weekly(values: &[(Decimal, Decimal, Decimal)]) -> Vec<WeeklyActuals> {
    let start = anchor() - Duration::weeks(values.len() as i64);
    values
        .iter()
        .enumerate()
        .map(|(i, &(inflow, outflow, revenue))| WeeklyActuals {
            week_start: start + Duration::weeks(i as i64),
            values: FlowValues {
                inflow: Money::new(inflow),
                outflow: Money::new(outflow),
                revenue: Money::new(revenue),
            },
        })
        .collect()
}

#[test]
fn test_flat_history_projects_flat_buckets() {
    let history = weekly(&[(dec!(1000), dec!(100), dec!(600)); 8]);
    let result = ForecastEngine::run(&params(13), &history, &[], Money::new(dec!(10000))).unwrap();

    assert_eq!(result.buckets.len(), 13);
    assert_eq!(result.base.inflow, Money::new(dec!(1000)));
    assert_eq!(result.growth.inflow, Decimal::ZERO);
    assert_eq!(result.buckets[0].period_key, "2025-W10");
    assert_eq!(result.buckets[12].period_key, "2025-W22");

    for (k, bucket) in result.buckets.iter().enumerate() {
        assert_eq!(bucket.system.inflow, Money::new(dec!(1000)));
        assert_eq!(bucket.effective, bucket.system);
        assert_eq!(bucket.net_cash_flow, Money::new(dec!(900)));
        let weeks = Decimal::from(k as u64 + 1);
        assert_eq!(bucket.cumulative_net, Money::new(dec!(900) * weeks));
        // +1000 inflow -600 revenue -100 outflow per week.
        assert_eq!(
            bucket.liability_balance,
            Money::new(dec!(10000) + dec!(300) * weeks)
        );
    }
    assert!(result.alerts.is_empty());
}

#[test]
fn test_trend_decays_with_horizon() {
    let mut rows = vec![(dec!(1000), dec!(0), dec!(0)); 4];
    rows.extend(vec![(dec!(1200), dec!(0), dec!(0)); 4]);
    let result = ForecastEngine::run(&params(3), &weekly(&rows), &[], Money::ZERO).unwrap();

    // base 1100, growth 0.2: 1100 * (1 + 0.2 * 0.85^(k+1)).
    assert_eq!(result.growth.inflow, dec!(0.2));
    assert_eq!(result.buckets[0].system.inflow, Money::new(dec!(1287.00)));
    assert_eq!(result.buckets[1].system.inflow, Money::new(dec!(1258.95)));
    assert_eq!(result.buckets[2].system.inflow, Money::new(dec!(1235.11)));
    assert!(result.buckets[0].trend_factor > result.buckets[2].trend_factor);
}

#[test]
fn test_seasonal_multiplier_applies_by_month() {
    let mut p = params(6);
    p.seasonal_multipliers[3] = dec!(1.5);
    let history = weekly(&[(dec!(1000), dec!(0), dec!(0)); 8]);
    let result = ForecastEngine::run(&p, &history, &[], Money::ZERO).unwrap();

    // A bucket takes the month of its Monday: 2025-03-31 stays in March.
    assert_eq!(result.buckets[4].week_start, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    assert_eq!(result.buckets[4].system.inflow, Money::new(dec!(1000)));
    assert_eq!(result.buckets[5].week_start, NaiveDate::from_ymd_opt(2025, 4, 7).unwrap());
    assert_eq!(result.buckets[5].system.inflow, Money::new(dec!(1500)));
}

#[test]
fn test_override_replaces_value_and_keeps_system() {
    let history = weekly(&[(dec!(1000), dec!(0), dec!(400)); 8]);
    let location = LocationId::new();
    let mut p = params(2);
    p.location_id = Some(location);

    let overrides = vec![
        ForecastOverride {
            period_key: "2025-W10".to_string(),
            location_id: Some(location),
            values: OverrideValues {
                inflow: Some(Money::new(dec!(5000))),
                ..OverrideValues::default()
            },
            reason: Some("Enrollment drive".to_string()),
            locked: true,
            updated_by: OperatorId::new(),
        },
        // Another location's override is ignored.
        ForecastOverride {
            period_key: "2025-W11".to_string(),
            location_id: Some(LocationId::new()),
            values: OverrideValues {
                inflow: Some(Money::ZERO),
                ..OverrideValues::default()
            },
            reason: None,
            locked: false,
            updated_by: OperatorId::new(),
        },
    ];

    let result = ForecastEngine::run(&p, &history, &overrides, Money::ZERO).unwrap();
    let first = &result.buckets[0];
    assert_eq!(first.system.inflow, Money::new(dec!(1000)));
    assert_eq!(first.effective.inflow, Money::new(dec!(5000)));
    assert_eq!(first.effective.revenue, Money::new(dec!(400)));
    assert!(first.locked);
    assert!(first.override_values.is_some());

    let second = &result.buckets[1];
    assert!(second.override_values.is_none());
    assert_eq!(second.effective.inflow, Money::new(dec!(1000)));
    assert_eq!(second.cumulative_net, Money::new(dec!(6000)));
}

#[test]
fn test_declining_liability_raises_alerts() {
    // No new sales, steady consumption of 1000 per week.
    let history = weekly(&[(dec!(0), dec!(0), dec!(1000)); 8]);
    let mut p = params(13);
    p.liability_floor = Money::new(dec!(5000));
    let result = ForecastEngine::run(&p, &history, &[], Money::new(dec!(12000))).unwrap();

    let last = result.buckets.last().unwrap();
    assert_eq!(last.liability_balance, Money::ZERO);

    let types: Vec<AlertType> = result.alerts.iter().map(|a| a.alert_type).collect();
    assert!(types.contains(&AlertType::LiabilityBelowFloor));
    assert!(types.contains(&AlertType::LiabilityDecline));
    assert!(!types.contains(&AlertType::NegativeCashFlow));
    assert_eq!(result.alerts.len(), 2);
}

proptest! {
    /// The run always yields exactly `horizon` consecutive weekly buckets.
    #[test]
    fn prop_bucket_count_and_continuity(horizon in 1u32..=52, inflow in 0i64..1_000_000) {
        let history = weekly(&[(Decimal::from(inflow), dec!(0), dec!(0)); 8]);
        let result = ForecastEngine::run(&params(horizon), &history, &[], Money::ZERO).unwrap();
        prop_assert_eq!(result.buckets.len(), horizon as usize);
        for pair in result.buckets.windows(2) {
            prop_assert_eq!(pair[1].week_start - pair[0].week_start, Duration::weeks(1));
        }
    }

    /// Liability never goes negative and net cash accumulates exactly.
    #[test]
    fn prop_running_balances(
        rows in prop::collection::vec((0i64..100_000, 0i64..100_000, 0i64..100_000), 8),
        starting in 0i64..10_000_000,
        horizon in 1u32..=26,
    ) {
        let rows: Vec<(Decimal, Decimal, Decimal)> = rows
            .into_iter()
            .map(|(a, b, c)| (Decimal::new(a, 2), Decimal::new(b, 2), Decimal::new(c, 2)))
            .collect();
        let result = ForecastEngine::run(
            &params(horizon),
            &weekly(&rows),
            &[],
            Money::from_cents(starting),
        ).unwrap();

        let mut running = Money::ZERO;
        for bucket in &result.buckets {
            prop_assert!(!bucket.liability_balance.is_negative());
            prop_assert!(!bucket.system.inflow.is_negative());
            running += bucket.net_cash_flow;
            prop_assert_eq!(bucket.cumulative_net, running);
        }
        let mut seen = std::collections::HashSet::new();
        for alert in &result.alerts {
            prop_assert!(seen.insert(alert.alert_type));
        }
    }

    /// Horizons outside 1..=52 are rejected.
    #[test]
    fn prop_horizon_bounds(horizon in 53u32..1000) {
        prop_assert!(ForecastEngine::run(&params(horizon), &[], &[], Money::ZERO).is_err());
    }
}
