//! Forecast result caching using Moka.
//!
//! Results are keyed by a fingerprint of everything a run depends on: the
//! resolved parameters, the weekly history, the applicable overrides and the
//! starting liability. New ledger activity changes the history fingerprint, so
//! stale entries are never served; override edits call [`ForecastCache::invalidate_all`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use lessonbook_shared::config::ForecastConfig;
use lessonbook_shared::types::Money;
use moka::sync::Cache;

use super::engine::ForecastEngine;
use super::error::ForecastError;
use super::types::{ForecastOverride, ForecastParams, ForecastResult, WeeklyActuals};

/// Cache for forecast results.
#[derive(Clone)]
pub struct ForecastCache {
    cache: Cache<String, Arc<ForecastResult>>,
}

impl ForecastCache {
    /// Creates a cache sized from configuration.
    #[must_use]
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self::with_config(config.cache_capacity, config.cache_ttl_secs)
    }

    /// Creates a new forecast cache.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of entries to cache
    /// * `ttl_secs` - Time-to-live in seconds for each entry
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { cache }
    }

    /// Hex fingerprint of a run's inputs.
    #[must_use]
    pub fn fingerprint(
        params: &ForecastParams,
        history: &[WeeklyActuals],
        overrides: &[ForecastOverride],
        starting_liability: Money,
    ) -> String {
        let mut hasher = DefaultHasher::new();
        params.hash(&mut hasher);
        history.hash(&mut hasher);
        overrides.hash(&mut hasher);
        starting_liability.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Runs a forecast, returning a cached result if available.
    ///
    /// Cached results are returned with `cached: true`. Validation errors are
    /// never cached.
    pub fn run_cached(
        &self,
        params: &ForecastParams,
        history: &[WeeklyActuals],
        overrides: &[ForecastOverride],
        starting_liability: Money,
    ) -> Result<ForecastResult, ForecastError> {
        let key = Self::fingerprint(params, history, overrides, starting_liability);

        if let Some(hit) = self.cache.get(&key) {
            let mut result = (*hit).clone();
            result.cached = true;
            return Ok(result);
        }

        let result = ForecastEngine::run(params, history, overrides, starting_liability)?;
        self.cache.insert(key, Arc::new(result.clone()));
        Ok(result)
    }

    /// Invalidates all cached entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Returns the number of entries currently in the cache.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance so counts and evictions are up to date.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for ForecastCache {
    fn default() -> Self {
        Self::from_config(&ForecastConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::types::FlowValues;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn params() -> ForecastParams {
        ForecastParams {
            anchor_week: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            horizon_weeks: 4,
            history_weeks: 8,
            location_id: None,
            seasonal_multipliers: [Decimal::ONE; 12],
            trend_decay: dec!(0.85),
            liability_floor: Money::ZERO,
            max_liability_decline: dec!(0.30),
        }
    }

    fn history(inflow: Decimal) -> Vec<WeeklyActuals> {
        vec![WeeklyActuals {
            week_start: NaiveDate::from_ymd_opt(2025, 2, 24).unwrap(),
            values: FlowValues {
                inflow: Money::new(inflow),
                ..FlowValues::default()
            },
        }]
    }

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = ForecastCache::default();
        let first = cache
            .run_cached(&params(), &history(dec!(800)), &[], Money::new(dec!(1000)))
            .unwrap();
        assert!(!first.cached);

        let second = cache
            .run_cached(&params(), &history(dec!(800)), &[], Money::new(dec!(1000)))
            .unwrap();
        assert!(second.cached);
        assert_eq!(first.buckets, second.buckets);
    }

    #[test]
    fn test_new_history_misses() {
        let cache = ForecastCache::default();
        cache
            .run_cached(&params(), &history(dec!(800)), &[], Money::ZERO)
            .unwrap();
        let changed = cache
            .run_cached(&params(), &history(dec!(900)), &[], Money::ZERO)
            .unwrap();
        assert!(!changed.cached);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = ForecastCache::default();
        let mut bad = params();
        bad.horizon_weeks = 0;
        assert!(cache.run_cached(&bad, &[], &[], Money::ZERO).is_err());
        cache.run_pending_tasks();
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = ForecastCache::default();
        cache.run_cached(&params(), &[], &[], Money::ZERO).unwrap();
        cache.invalidate_all();
        let again = cache.run_cached(&params(), &[], &[], Money::ZERO).unwrap();
        assert!(!again.cached);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = ForecastCache::fingerprint(&params(), &history(dec!(1)), &[], Money::ZERO);
        let b = ForecastCache::fingerprint(&params(), &history(dec!(1)), &[], Money::ZERO);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
