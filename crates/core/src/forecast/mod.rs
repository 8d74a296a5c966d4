//! Rolling weekly cash-flow and liability forecast.

pub mod alerts;
pub mod cache;
pub mod engine;
pub mod error;
pub mod overrides;
pub mod types;

#[cfg(test)]
mod tests;

pub use alerts::AlertEvaluator;
pub use cache::ForecastCache;
pub use engine::{ForecastEngine, MAX_WEEKS};
pub use error::ForecastError;
pub use overrides::OverrideService;
pub use types::{
    AlertSeverity, AlertType, FlowValues, ForecastAlert, ForecastBucket, ForecastOverride,
    ForecastParams, ForecastRequest, ForecastResult, GrowthRates, OverrideValues,
    SetOverrideInput, WeeklyActuals, period_key, week_start,
};
