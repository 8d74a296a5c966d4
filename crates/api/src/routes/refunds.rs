//! Refund routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use lessonbook_core::ledger::PaymentMethod;
use lessonbook_core::refund::{
    ApproveRefundInput, CompleteRefundInput, RefundType, RequestRefundInput,
};
use lessonbook_db::RefundRepository;
use lessonbook_shared::types::{ContractId, Money, RefundCaseId};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError, extractors::Operator};

/// Creates the refund routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contracts/{id}/refund-preview", get(preview))
        .route("/contracts/{id}/refunds", get(list_refunds))
        .route("/refunds", post(request_refund))
        .route("/refunds/{id}", get(get_refund))
        .route("/refunds/{id}/approve", post(approve))
        .route("/refunds/{id}/complete", post(complete))
        .route("/refunds/{id}/cancel", post(cancel))
}

// ============================================================================
// Request Types
// ============================================================================

/// Query for a refund preview.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Handling fee withheld from the payout.
    #[serde(default)]
    pub deduction: Option<Money>,
}

/// Request body for opening a refund case.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Contract to refund.
    pub contract_id: ContractId,
    /// Kind of refund.
    #[serde(default = "default_refund_type")]
    pub refund_type: RefundType,
    /// Customer's reason.
    pub reason: String,
    /// Handling fee withheld from the payout.
    #[serde(default)]
    pub deduction: Option<Money>,
}

const fn default_refund_type() -> RefundType {
    RefundType::Normal
}

/// Request body for an approval decision.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    /// Approve or reject.
    pub approved: bool,
    /// Approver's remark; required for a rejection.
    #[serde(default)]
    pub remark: Option<String>,
    /// Payout amount replacing the requested one.
    #[serde(default)]
    pub adjusted_amount: Option<Money>,
}

/// Request body for recording the payout.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    /// Payout method.
    pub method: PaymentMethod,
    /// Destination account.
    #[serde(default)]
    pub account: Option<String>,
}

fn repo(state: &AppState) -> RefundRepository {
    RefundRepository::new((*state.db).clone(), state.ledger.clone())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/contracts/{id}/refund-preview?deduction=`
async fn preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = repo(&state)
        .preview(
            ContractId::from_uuid(id),
            query.deduction.unwrap_or(Money::ZERO),
        )
        .await?;
    Ok(Json(quote))
}

/// POST `/refunds`
async fn request_refund(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(payload): Json<RefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let case = repo(&state)
        .request(RequestRefundInput {
            contract_id: payload.contract_id,
            refund_type: payload.refund_type,
            reason: payload.reason,
            deduction: payload.deduction.unwrap_or(Money::ZERO),
            requested_by: operator,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(case)))
}

/// GET `/refunds/{id}`
async fn get_refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).get(RefundCaseId::from_uuid(id)).await?))
}

/// GET `/contracts/{id}/refunds`
async fn list_refunds(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        repo(&state)
            .list_for_contract(ContractId::from_uuid(id))
            .await?,
    ))
}

/// POST `/refunds/{id}/approve`
async fn approve(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let case = repo(&state)
        .approve(
            RefundCaseId::from_uuid(id),
            ApproveRefundInput {
                approved: payload.approved,
                remark: payload.remark,
                adjusted_amount: payload.adjusted_amount,
                approver: operator,
            },
        )
        .await?;
    info!(refund_id = %id, approved = payload.approved, "Refund decision recorded");
    Ok(Json(case))
}

/// POST `/refunds/{id}/complete`
async fn complete(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = repo(&state)
        .complete(
            RefundCaseId::from_uuid(id),
            CompleteRefundInput {
                method: payload.method,
                account: payload.account,
                completed_by: operator,
            },
        )
        .await?;
    Ok(Json(result))
}

/// POST `/refunds/{id}/cancel`
async fn cancel(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        repo(&state)
            .cancel(RefundCaseId::from_uuid(id), operator)
            .await?,
    ))
}
