//! Alert derivation over forecast buckets.
//!
//! Alerts are recomputed on every run and never persisted. Each alert type is
//! reported at most once, against the worst bucket for that type.

use lessonbook_shared::types::Money;
use rust_decimal::Decimal;

use super::types::{AlertSeverity, AlertType, ForecastAlert, ForecastBucket, ForecastParams};

const RATIO_SCALE: u32 = 4;

/// Derives alerts from a bucket sequence.
pub struct AlertEvaluator;

impl AlertEvaluator {
    /// Evaluates every alert rule, most severe first.
    #[must_use]
    pub fn evaluate(
        params: &ForecastParams,
        buckets: &[ForecastBucket],
        starting_liability: Money,
        average_inflow: Money,
    ) -> Vec<ForecastAlert> {
        let mut alerts: Vec<ForecastAlert> = [
            Self::negative_cash_flow(buckets, average_inflow),
            Self::liability_below_floor(buckets, params.liability_floor),
            Self::liability_decline(buckets, starting_liability, params.max_liability_decline),
        ]
        .into_iter()
        .flatten()
        .collect();

        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.alert_type.cmp(&b.alert_type))
        });
        alerts
    }

    /// Cumulative net cash below zero. Critical when the deficit exceeds one
    /// week's average inflow.
    fn negative_cash_flow(
        buckets: &[ForecastBucket],
        average_inflow: Money,
    ) -> Option<ForecastAlert> {
        let worst = first_min_by(buckets, |b| b.cumulative_net)?;
        if !worst.cumulative_net.is_negative() {
            return None;
        }

        let deficit = -worst.cumulative_net;
        let severity = if deficit > average_inflow {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        Some(ForecastAlert {
            alert_type: AlertType::NegativeCashFlow,
            severity,
            period_key: worst.period_key.clone(),
            value: worst.cumulative_net.amount(),
            threshold: Decimal::ZERO,
            message: format!(
                "Cumulative net cash flow reaches {} in {}",
                worst.cumulative_net, worst.period_key
            ),
        })
    }

    /// Liability under the configured floor. Critical below half the floor.
    fn liability_below_floor(buckets: &[ForecastBucket], floor: Money) -> Option<ForecastAlert> {
        if !floor.is_positive() {
            return None;
        }
        let worst = first_min_by(buckets, |b| b.liability_balance)?;
        if worst.liability_balance >= floor {
            return None;
        }

        let severity = if worst.liability_balance.amount() * Decimal::TWO < floor.amount() {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        Some(ForecastAlert {
            alert_type: AlertType::LiabilityBelowFloor,
            severity,
            period_key: worst.period_key.clone(),
            value: worst.liability_balance.amount(),
            threshold: floor.amount(),
            message: format!(
                "Liability balance {} falls below floor {} in {}",
                worst.liability_balance, floor, worst.period_key
            ),
        })
    }

    /// Fractional decline versus the anchor above the maximum. Critical above
    /// twice the maximum.
    fn liability_decline(
        buckets: &[ForecastBucket],
        starting_liability: Money,
        max_decline: Decimal,
    ) -> Option<ForecastAlert> {
        if !starting_liability.is_positive() {
            return None;
        }
        let worst = first_min_by(buckets, |b| b.liability_balance)?;
        let decline = ((starting_liability - worst.liability_balance).amount()
            / starting_liability.amount())
        .round_dp(RATIO_SCALE);
        if decline <= max_decline {
            return None;
        }

        let severity = if decline > max_decline * Decimal::TWO {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        Some(ForecastAlert {
            alert_type: AlertType::LiabilityDecline,
            severity,
            period_key: worst.period_key.clone(),
            value: decline,
            threshold: max_decline,
            message: format!(
                "Liability declines {}% versus anchor by {}",
                (decline * Decimal::ONE_HUNDRED).normalize(),
                worst.period_key
            ),
        })
    }
}

/// Earliest bucket with the smallest key.
fn first_min_by<F>(buckets: &[ForecastBucket], key: F) -> Option<&ForecastBucket>
where
    F: Fn(&ForecastBucket) -> Money,
{
    buckets.iter().fold(None, |best, bucket| match best {
        Some(current) if key(current) <= key(bucket) => Some(current),
        _ => Some(bucket),
    })
}
