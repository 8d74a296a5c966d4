//! Consumption routes: single, roster batch and revocation.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use lessonbook_core::consumption::{
    BatchConsumeInput, ConsumeInput, ConsumptionType, RosterEntry, SessionInfo,
};
use lessonbook_db::ConsumptionRepository;
use lessonbook_db::repositories::RevokeInput;
use lessonbook_shared::types::{ConsumptionId, ContractId, LocationId, OperatorId, TeacherId};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, error::ApiError, extractors::Operator};

/// Creates the consumption routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/contracts/{id}/consumptions",
            get(list_consumptions).post(consume),
        )
        .route("/consumptions/batch", post(consume_batch))
        .route("/consumptions/{id}", get(get_consumption))
        .route("/consumptions/{id}/revoke", post(revoke))
}

// ============================================================================
// Request Types
// ============================================================================

/// Lesson session details; the operator comes from the request header.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    /// Teaching teacher.
    pub teacher_id: TeacherId,
    /// Campus.
    pub location_id: LocationId,
    /// Day of the lesson.
    pub lesson_date: NaiveDate,
    /// Lessons deducted per student.
    pub lessons: u32,
    /// Free-text remark.
    #[serde(default)]
    pub remark: Option<String>,
}

impl SessionRequest {
    fn into_session(self, operator: OperatorId) -> SessionInfo {
        SessionInfo {
            teacher_id: self.teacher_id,
            location_id: self.location_id,
            lesson_date: self.lesson_date,
            lessons: self.lessons,
            operator,
            remark: self.remark,
        }
    }
}

/// Request body for consuming lessons from one contract.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// Kind of consumption.
    #[serde(default)]
    pub consumption_type: ConsumptionType,
    /// Session details.
    #[serde(flatten)]
    pub session: SessionRequest,
}

/// Request body for a roster batch.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Shared session.
    pub session: SessionRequest,
    /// One entry per student.
    pub entries: Vec<RosterEntry>,
}

/// Request body for revoking a consumption.
#[derive(Debug, Default, Deserialize)]
pub struct RevokeRequest {
    /// Why the record is revoked.
    #[serde(default)]
    pub reason: Option<String>,
}

fn repo(state: &AppState) -> ConsumptionRepository {
    ConsumptionRepository::new((*state.db).clone(), state.ledger.clone())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/contracts/{id}/consumptions`
async fn consume(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConsumeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = repo(&state)
        .consume(ConsumeInput {
            contract_id: ContractId::from_uuid(id),
            consumption_type: payload.consumption_type,
            session: payload.session.into_session(operator),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET `/contracts/{id}/consumptions`
async fn list_consumptions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        repo(&state)
            .list_for_contract(ContractId::from_uuid(id))
            .await?,
    ))
}

/// POST `/consumptions/batch` - Apply a class roster.
///
/// Per-student failures are reported in the body; the call itself only fails
/// for an invalid session.
async fn consume_batch(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(payload): Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = repo(&state)
        .consume_batch(BatchConsumeInput {
            session: payload.session.into_session(operator),
            entries: payload.entries,
        })
        .await?;

    Ok(Json(json!({
        "succeeded": outcome.succeeded,
        "noted": outcome.noted,
        "failed": outcome.failed,
        "counts": {
            "total": outcome.total(),
            "succeeded": outcome.succeeded.len(),
            "noted": outcome.noted.len(),
            "failed": outcome.failed.len(),
        },
    })))
}

/// GET `/consumptions/{id}`
async fn get_consumption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(repo(&state).get(ConsumptionId::from_uuid(id)).await?))
}

/// POST `/consumptions/{id}/revoke`
async fn revoke(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<Uuid>,
    payload: Option<Json<RevokeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    let result = repo(&state)
        .revoke(
            ConsumptionId::from_uuid(id),
            RevokeInput {
                operator,
                reason: payload.reason,
            },
        )
        .await?;
    Ok(Json(result))
}
