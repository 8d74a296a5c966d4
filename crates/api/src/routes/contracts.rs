//! Contract and payment routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use lessonbook_core::ledger::{CreateContractInput, PaymentInput};
use lessonbook_core::sequence::business_date;
use lessonbook_db::repositories::ContractFilter;
use lessonbook_db::ContractRepository;
use lessonbook_shared::types::{ContractId, CustomerId, LocationId, Money, PackageId, PageRequest};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError, extractors::Operator};

/// Creates the contract routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contracts", get(list_contracts).post(create_contract))
        .route("/contracts/liability", get(liability_summary))
        .route("/contracts/by-number/{number}", get(get_contract_by_number))
        .route("/contracts/{id}", get(get_contract))
        .route("/contracts/{id}/invariants", get(check_invariants))
        .route(
            "/contracts/{id}/payments",
            get(list_payments).post(apply_payment),
        )
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for signing a contract.
#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    /// Buyer.
    pub customer_id: CustomerId,
    /// Package sold.
    pub package_id: PackageId,
    /// Selling campus.
    pub location_id: LocationId,
    /// Discount off the package price.
    #[serde(default)]
    pub discount: Option<Money>,
    /// First day of validity; today in the business timezone when absent.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Payment taken at signing.
    #[serde(default)]
    pub initial_payment: Option<PaymentInput>,
}

/// Query for the liability summary.
#[derive(Debug, Deserialize)]
pub struct LiabilityQuery {
    /// Restrict to one campus.
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

fn repo(state: &AppState) -> ContractRepository {
    ContractRepository::new((*state.db).clone(), state.ledger.clone())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/contracts` - Sign a contract, optionally with its first payment.
async fn create_contract(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(payload): Json<CreateContractRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let start_date = payload
        .start_date
        .unwrap_or_else(|| business_date(Utc::now(), state.ledger.timezone));

    let detail = repo(&state)
        .create(CreateContractInput {
            customer_id: payload.customer_id,
            package_id: payload.package_id,
            location_id: payload.location_id,
            discount: payload.discount.unwrap_or(Money::ZERO),
            start_date,
            initial_payment: payload.initial_payment,
            operator,
        })
        .await?;

    info!(contract_no = %detail.contract.contract_no, "Contract created via API");
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET `/contracts` - List contracts filtered by customer, location or status.
async fn list_contracts(
    State(state): State<AppState>,
    Query(filter): Query<ContractFilter>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).list(&filter, &page).await?))
}

/// GET `/contracts/{id}`
async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).get(ContractId::from_uuid(id)).await?))
}

/// GET `/contracts/by-number/{number}`
async fn get_contract_by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).get_by_number(&number).await?))
}

/// GET `/contracts/{id}/invariants` - Re-check the ledger invariants of one contract.
async fn check_invariants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        repo(&state)
            .check_invariants(ContractId::from_uuid(id))
            .await?,
    ))
}

/// GET `/contracts/liability` - Unearned total over active contracts.
async fn liability_summary(
    State(state): State<AppState>,
    Query(query): Query<LiabilityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).liability_summary(query.location_id).await?))
}

/// POST `/contracts/{id}/payments`
async fn apply_payment(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let result = repo(&state)
        .apply_payment(ContractId::from_uuid(id), payload, operator)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET `/contracts/{id}/payments`
async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        repo(&state)
            .list_payments(ContractId::from_uuid(id))
            .await?,
    ))
}
