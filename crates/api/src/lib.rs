//! HTTP API layer with Axum routes and extractors.
//!
//! This crate provides:
//! - REST API routes for every ledger operation
//! - The `X-Operator-Id` extractor
//! - Mapping of domain errors onto HTTP responses

pub mod error;
pub mod extractors;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use lessonbook_db::{ForecastRepository, LedgerContext};
use lessonbook_shared::AppConfig;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Repository settings and the event sink.
    pub ledger: LedgerContext,
    /// Forecast repository; shared so its result cache outlives a request.
    pub forecasts: ForecastRepository,
}

impl AppState {
    /// Builds the state from a connection and loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown business timezone.
    pub fn new(
        db: DatabaseConnection,
        config: &AppConfig,
    ) -> Result<Self, lessonbook_shared::AppError> {
        let ledger = LedgerContext::from_config(config)?;
        Ok(Self::with_context(db, ledger, config))
    }

    /// Builds the state around an existing ledger context.
    #[must_use]
    pub fn with_context(db: DatabaseConnection, ledger: LedgerContext, config: &AppConfig) -> Self {
        let forecasts = ForecastRepository::new(db.clone(), ledger.clone(), config.forecast.clone());
        Self {
            db: Arc::new(db),
            ledger,
            forecasts,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
