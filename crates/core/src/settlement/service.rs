//! Daily settlement aggregation.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use lessonbook_shared::types::SettlementId;

use super::error::SettlementError;
use super::types::{
    CashFlowDirection, CashFlowEvent, ConsumptionFact, DayBounds, SettleInput, SettlementReport,
    SettlementTotals,
};
use crate::ledger::ConsumptionStatus;

/// Stateless settlement operations.
pub struct SettlementService;

impl SettlementService {
    /// UTC bounds of a business day in `tz`.
    ///
    /// Days whose local midnight falls into a DST gap start at the first valid
    /// local instant.
    pub fn day_bounds(date: NaiveDate, tz: Tz) -> Result<DayBounds, SettlementError> {
        let next = date
            .succ_opt()
            .ok_or(SettlementError::InvalidDate(date))?;
        let start = local_day_start(date, tz).ok_or(SettlementError::InvalidDate(date))?;
        let end = local_day_start(next, tz).ok_or(SettlementError::InvalidDate(date))?;
        Ok(DayBounds { start, end })
    }

    /// Rejects reversed date ranges.
    pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), SettlementError> {
        if from > to {
            return Err(SettlementError::InvalidRange { from, to });
        }
        Ok(())
    }

    /// Aggregates one day's activity.
    ///
    /// Records outside `bounds` are ignored. Consumptions count when written
    /// during the day and still standing; revocations count on the day they
    /// happened.
    ///
    /// Revenue follows the write time, not the lesson date, so a closed day
    /// never changes when a lesson is back-dated. Forecast history buckets
    /// revenue by lesson date.
    #[must_use]
    pub fn aggregate(
        bounds: &DayBounds,
        cash_flows: &[CashFlowEvent],
        consumptions: &[ConsumptionFact],
    ) -> SettlementTotals {
        let mut totals = SettlementTotals::default();

        for event in cash_flows.iter().filter(|e| bounds.contains(e.occurred_at)) {
            match event.direction {
                CashFlowDirection::Inflow => {
                    totals.payment_count += 1;
                    totals.payment_total += event.amount;
                }
                CashFlowDirection::Outflow => {
                    totals.refund_count += 1;
                    totals.refund_total += event.amount;
                }
            }
        }
        totals.net_cash = totals.payment_total - totals.refund_total;

        for fact in consumptions {
            if fact.status == ConsumptionStatus::Normal && bounds.contains(fact.created_at) {
                totals.consumption_count += 1;
                totals.lessons_consumed += u64::from(fact.lessons);
                totals.recognized_revenue += fact.amount;
            }
            if fact.revoked_at.is_some_and(|at| bounds.contains(at)) {
                totals.revoked_count += 1;
            }
        }

        totals
    }

    /// Builds the report, refusing to settle a day twice.
    ///
    /// # Errors
    ///
    /// `AlreadySettled` when `existing` holds a report for the same day and location.
    pub fn settle(
        existing: Option<SettlementId>,
        input: SettleInput,
        totals: SettlementTotals,
        settled_at: DateTime<Utc>,
    ) -> Result<SettlementReport, SettlementError> {
        if existing.is_some() {
            return Err(SettlementError::AlreadySettled {
                date: input.date,
                location_id: input.location_id.into_inner(),
            });
        }

        Ok(SettlementReport {
            id: SettlementId::new(),
            settle_date: input.date,
            location_id: input.location_id,
            totals: SettlementTotals {
                net_cash: totals.payment_total - totals.refund_total,
                ..totals
            },
            settled_by: input.operator,
            settled_at,
        })
    }

    /// Sum of a set of reports, for range summaries.
    #[must_use]
    pub fn summarize(reports: &[SettlementReport]) -> SettlementTotals {
        reports
            .iter()
            .fold(SettlementTotals::default(), |mut acc, report| {
                let t = &report.totals;
                acc.payment_count += t.payment_count;
                acc.payment_total += t.payment_total;
                acc.refund_count += t.refund_count;
                acc.refund_total += t.refund_total;
                acc.consumption_count += t.consumption_count;
                acc.lessons_consumed += t.lessons_consumed;
                acc.recognized_revenue += t.recognized_revenue;
                acc.revoked_count += t.revoked_count;
                acc.net_cash = acc.payment_total - acc.refund_total;
                acc
            })
    }
}

fn local_day_start(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=2).find_map(|hours| {
        tz.from_local_datetime(&(midnight + Duration::hours(hours)))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::types::CashFlowSource;
    use lessonbook_shared::types::{LocationId, Money, OperatorId};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cash(source: CashFlowSource, amount: Money, at: DateTime<Utc>) -> CashFlowEvent {
        CashFlowEvent::from_source(source, Uuid::now_v7(), amount, LocationId::new(), at)
    }

    fn consumption(lessons: u32, amount: Money, at: DateTime<Utc>) -> ConsumptionFact {
        ConsumptionFact {
            lessons,
            amount,
            status: ConsumptionStatus::Normal,
            created_at: at,
            revoked_at: None,
        }
    }

    #[test]
    fn test_day_bounds_in_business_timezone() {
        let bounds = SettlementService::day_bounds(date(2025, 3, 3), chrono_tz::Asia::Shanghai)
            .unwrap();
        assert_eq!(bounds.start, utc(2025, 3, 2, 16, 0));
        assert_eq!(bounds.end, utc(2025, 3, 3, 16, 0));
    }

    #[test]
    fn test_day_bounds_across_dst() {
        let spring =
            SettlementService::day_bounds(date(2025, 3, 9), chrono_tz::America::New_York).unwrap();
        assert_eq!(spring.end - spring.start, Duration::hours(23));

        let autumn =
            SettlementService::day_bounds(date(2025, 11, 2), chrono_tz::America::New_York).unwrap();
        assert_eq!(autumn.end - autumn.start, Duration::hours(25));
    }

    #[test]
    fn test_day_bounds_when_midnight_is_skipped() {
        // Brazil started DST at local midnight on 2018-11-04.
        let bounds =
            SettlementService::day_bounds(date(2018, 11, 4), chrono_tz::America::Sao_Paulo)
                .unwrap();
        assert_eq!(bounds.start, utc(2018, 11, 4, 3, 0));
    }

    #[test]
    fn test_aggregate() {
        let bounds = SettlementService::day_bounds(date(2025, 3, 3), chrono_tz::Asia::Shanghai)
            .unwrap();
        let inside = utc(2025, 3, 3, 2, 0);
        let before = utc(2025, 3, 2, 15, 59);
        let after = utc(2025, 3, 3, 16, 0);

        let flows = vec![
            cash(CashFlowSource::Payment, Money::new(dec!(4800)), inside),
            cash(CashFlowSource::Payment, Money::new(dec!(1200)), inside),
            cash(CashFlowSource::Refund, Money::new(dec!(3600)), inside),
            cash(CashFlowSource::Payment, Money::new(dec!(999)), before),
            cash(CashFlowSource::Refund, Money::new(dec!(999)), after),
        ];

        let mut revoked = consumption(2, Money::new(dec!(200)), inside);
        revoked.status = ConsumptionStatus::Revoked;
        revoked.revoked_at = Some(inside);
        let mut revoked_earlier_record = consumption(1, Money::new(dec!(100)), before);
        revoked_earlier_record.status = ConsumptionStatus::Revoked;
        revoked_earlier_record.revoked_at = Some(inside);

        let facts = vec![
            consumption(2, Money::new(dec!(200)), inside),
            consumption(1, Money::new(dec!(100)), inside),
            consumption(3, Money::new(dec!(300)), before),
            revoked,
            revoked_earlier_record,
        ];

        let totals = SettlementService::aggregate(&bounds, &flows, &facts);
        assert_eq!(totals.payment_count, 2);
        assert_eq!(totals.payment_total, Money::new(dec!(6000)));
        assert_eq!(totals.refund_count, 1);
        assert_eq!(totals.refund_total, Money::new(dec!(3600)));
        assert_eq!(totals.net_cash, Money::new(dec!(2400)));
        assert_eq!(totals.consumption_count, 2);
        assert_eq!(totals.lessons_consumed, 3);
        assert_eq!(totals.recognized_revenue, Money::new(dec!(300)));
        assert_eq!(totals.revoked_count, 2);
    }

    #[test]
    fn test_settle_twice_fails() {
        let input = SettleInput {
            date: date(2025, 3, 3),
            location_id: LocationId::new(),
            operator: OperatorId::new(),
        };
        let report =
            SettlementService::settle(None, input, SettlementTotals::default(), Utc::now())
                .unwrap();
        assert_eq!(report.settle_date, input.date);

        let err = SettlementService::settle(
            Some(report.id),
            input,
            SettlementTotals::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, SettlementError::AlreadySettled { .. }));
    }

    #[test]
    fn test_summarize() {
        let input = SettleInput {
            date: date(2025, 3, 3),
            location_id: LocationId::new(),
            operator: OperatorId::new(),
        };
        let totals = SettlementTotals {
            payment_count: 1,
            payment_total: Money::new(dec!(100)),
            refund_count: 1,
            refund_total: Money::new(dec!(40)),
            lessons_consumed: 2,
            ..SettlementTotals::default()
        };
        let a = SettlementService::settle(None, input, totals, Utc::now()).unwrap();
        let b = SettlementService::settle(None, input, totals, Utc::now()).unwrap();
        assert_eq!(a.totals.net_cash, Money::new(dec!(60)));

        let sum = SettlementService::summarize(&[a, b]);
        assert_eq!(sum.payment_total, Money::new(dec!(200)));
        assert_eq!(sum.net_cash, Money::new(dec!(120)));
        assert_eq!(sum.lessons_consumed, 4);
    }

    #[test]
    fn test_validate_range() {
        assert!(SettlementService::validate_range(date(2025, 3, 1), date(2025, 3, 1)).is_ok());
        assert!(SettlementService::validate_range(date(2025, 3, 2), date(2025, 3, 1)).is_err());
    }
}
