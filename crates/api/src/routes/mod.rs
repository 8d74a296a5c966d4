//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod consumptions;
pub mod contracts;
pub mod forecasts;
pub mod health;
pub mod refunds;
pub mod settlements;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(contracts::routes())
        .merge(consumptions::routes())
        .merge(refunds::routes())
        .merge(settlements::routes())
        .merge(forecasts::routes())
}
