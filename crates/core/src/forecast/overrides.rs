//! Manual forecast overrides and bucket locking.

use chrono::{NaiveDate, Weekday};
use lessonbook_shared::types::OperatorId;

use super::error::ForecastError;
use super::types::{ForecastOverride, SetOverrideInput, period_key};

/// Validates override edits against the stored override for the same bucket.
pub struct OverrideService;

impl OverrideService {
    /// Parses an ISO week key (`YYYY-Www`) into the Monday of that week.
    ///
    /// Only the canonical two-digit form is accepted, so a key always maps to one row.
    pub fn parse_period_key(key: &str) -> Result<NaiveDate, ForecastError> {
        let invalid = || ForecastError::InvalidPeriodKey(key.to_string());

        let (year, week) = key.split_once("-W").ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;

        if period_key(monday) != key {
            return Err(invalid());
        }
        Ok(monday)
    }

    /// Validates and builds the override to store.
    ///
    /// # Errors
    ///
    /// `Locked` when the stored override for the bucket is locked.
    pub fn set(
        existing: Option<&ForecastOverride>,
        input: SetOverrideInput,
    ) -> Result<ForecastOverride, ForecastError> {
        Self::parse_period_key(&input.period_key)?;

        if input.values.is_empty() {
            return Err(ForecastError::InvalidOverride(
                "at least one of inflow, outflow or revenue is required".to_string(),
            ));
        }
        let negative = [input.values.inflow, input.values.outflow, input.values.revenue]
            .into_iter()
            .flatten()
            .any(|value| value.is_negative());
        if negative {
            return Err(ForecastError::InvalidOverride(
                "override values must not be negative".to_string(),
            ));
        }

        if existing.is_some_and(|o| o.locked) {
            return Err(ForecastError::Locked {
                period_key: input.period_key,
            });
        }

        Ok(ForecastOverride {
            period_key: input.period_key,
            location_id: input.location_id,
            values: input.values,
            reason: input.reason.filter(|r| !r.trim().is_empty()),
            locked: false,
            updated_by: input.operator,
        })
    }

    /// Locks the bucket's override. Locking an already locked bucket is a no-op.
    ///
    /// # Errors
    ///
    /// `OverrideNotFound` when there is nothing to lock.
    pub fn lock(
        existing: Option<ForecastOverride>,
        period_key: &str,
        operator: OperatorId,
    ) -> Result<ForecastOverride, ForecastError> {
        Self::parse_period_key(period_key)?;

        let mut current = existing.ok_or_else(|| ForecastError::OverrideNotFound {
            period_key: period_key.to_string(),
        })?;
        if !current.locked {
            current.locked = true;
            current.updated_by = operator;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::types::OverrideValues;
    use lessonbook_shared::types::{LocationId, Money};
    use rust_decimal_macros::dec;

    fn input(key: &str) -> SetOverrideInput {
        SetOverrideInput {
            period_key: key.to_string(),
            location_id: Some(LocationId::new()),
            values: OverrideValues {
                inflow: Some(Money::new(dec!(5000))),
                ..OverrideValues::default()
            },
            reason: Some("Spring promotion".to_string()),
            operator: OperatorId::new(),
        }
    }

    #[test]
    fn test_parse_period_key() {
        assert_eq!(
            OverrideService::parse_period_key("2025-W10").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
        assert_eq!(
            OverrideService::parse_period_key("2025-W01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 30).unwrap()
        );
        for bad in ["2025-10", "2025-W1", "2025-W54", "abcd-W10", "2025-W00", ""] {
            assert!(
                matches!(
                    OverrideService::parse_period_key(bad),
                    Err(ForecastError::InvalidPeriodKey(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_set_and_lock() {
        let stored = OverrideService::set(None, input("2025-W10")).unwrap();
        assert!(!stored.locked);
        assert_eq!(stored.values.inflow, Some(Money::new(dec!(5000))));

        let operator = OperatorId::new();
        let locked = OverrideService::lock(Some(stored.clone()), "2025-W10", operator).unwrap();
        assert!(locked.locked);
        assert_eq!(locked.updated_by, operator);

        let err = OverrideService::set(Some(&locked), input("2025-W10")).unwrap_err();
        assert!(matches!(err, ForecastError::Locked { .. }));
        assert_eq!(err.http_status_code(), 423);
    }

    #[test]
    fn test_lock_without_override() {
        let err = OverrideService::lock(None, "2025-W10", OperatorId::new()).unwrap_err();
        assert!(matches!(err, ForecastError::OverrideNotFound { .. }));
        assert_eq!(err.http_status_code(), 404);
    }

    #[test]
    fn test_set_rejects_empty_or_negative_values() {
        let mut empty = input("2025-W10");
        empty.values = OverrideValues::default();
        assert!(matches!(
            OverrideService::set(None, empty),
            Err(ForecastError::InvalidOverride(_))
        ));

        let mut negative = input("2025-W10");
        negative.values.outflow = Some(Money::new(dec!(-1)));
        assert!(matches!(
            OverrideService::set(None, negative),
            Err(ForecastError::InvalidOverride(_))
        ));
    }
}
