//! Daily settlement routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use lessonbook_core::settlement::SettleInput;
use lessonbook_db::SettlementRepository;
use lessonbook_shared::types::LocationId;
use serde::Deserialize;

use crate::{AppState, error::ApiError, extractors::Operator};

/// Creates the settlement routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settlements", get(list_settlements).post(settle))
        .route("/settlements/{date}", get(get_settlement))
}

/// Request body for settling a day.
#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    /// Business date.
    pub date: NaiveDate,
    /// Campus.
    pub location_id: LocationId,
}

/// Query for listing reports.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Campus.
    pub location_id: LocationId,
    /// First day, inclusive.
    pub from: NaiveDate,
    /// Last day, inclusive.
    pub to: NaiveDate,
}

/// Query naming the campus of one report.
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    /// Campus.
    pub location_id: LocationId,
}

fn repo(state: &AppState) -> SettlementRepository {
    SettlementRepository::new((*state.db).clone(), state.ledger.clone())
}

/// POST `/settlements`
async fn settle(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(payload): Json<SettleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = repo(&state)
        .settle(SettleInput {
            date: payload.date,
            location_id: payload.location_id,
            operator,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET `/settlements?location_id=&from=&to=`
async fn list_settlements(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        repo(&state)
            .list(query.location_id, query.from, query.to)
            .await?,
    ))
}

/// GET `/settlements/{date}?location_id=`
async fn get_settlement(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).get(date, query.location_id).await?))
}
