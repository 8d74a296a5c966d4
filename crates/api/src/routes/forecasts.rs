//! Rolling forecast routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use lessonbook_core::forecast::{ForecastRequest, OverrideValues, SetOverrideInput};
use lessonbook_shared::types::{LocationId, Money};
use serde::Deserialize;

use crate::{AppState, error::ApiError, extractors::Operator};

/// Creates the forecast routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/forecasts/run", post(run_forecast))
        .route("/forecasts/overrides", get(list_overrides).put(set_override))
        .route("/forecasts/overrides/lock", post(lock_override))
}

/// Request body for a manual override.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    /// ISO week key, `YYYY-Www`.
    pub period_key: String,
    /// Campus; ledger-wide when absent.
    #[serde(default)]
    pub location_id: Option<LocationId>,
    /// Replacement inflow.
    #[serde(default)]
    pub inflow: Option<Money>,
    /// Replacement outflow.
    #[serde(default)]
    pub outflow: Option<Money>,
    /// Replacement revenue.
    #[serde(default)]
    pub revenue: Option<Money>,
    /// Why the numbers were changed.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for locking a bucket.
#[derive(Debug, Deserialize)]
pub struct LockRequest {
    /// ISO week key, `YYYY-Www`.
    pub period_key: String,
    /// Campus; ledger-wide when absent.
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

/// Query for listing overrides.
#[derive(Debug, Deserialize)]
pub struct OverrideQuery {
    /// Campus; ledger-wide when absent.
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

/// POST `/forecasts/run`
///
/// An empty body runs with the configured defaults.
async fn run_forecast(
    State(state): State<AppState>,
    payload: Option<Json<ForecastRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.unwrap_or_default();
    Ok(Json(state.forecasts.run(&request).await?))
}

/// GET `/forecasts/overrides?location_id=`
async fn list_overrides(
    State(state): State<AppState>,
    Query(query): Query<OverrideQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.forecasts.list_overrides(query.location_id).await?))
}

/// PUT `/forecasts/overrides`
async fn set_override(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(payload): Json<OverrideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .forecasts
        .set_override(SetOverrideInput {
            period_key: payload.period_key,
            location_id: payload.location_id,
            values: OverrideValues {
                inflow: payload.inflow,
                outflow: payload.outflow,
                revenue: payload.revenue,
            },
            reason: payload.reason,
            operator,
        })
        .await?;
    Ok(Json(saved))
}

/// POST `/forecasts/overrides/lock`
async fn lock_override(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(payload): Json<LockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state
            .forecasts
            .lock_override(&payload.period_key, payload.location_id, operator)
            .await?,
    ))
}
