//! Mapping of domain errors onto HTTP responses.
//!
//! Every response body has the shape `{"error": CODE, "message": text}`.
//! The status comes from the error's [`ErrorCategory`]. Server-side failures
//! are logged and their details withheld from the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lessonbook_core::forecast::ForecastError;
use lessonbook_core::ledger::LedgerError;
use lessonbook_core::refund::RefundError;
use lessonbook_core::settlement::SettlementError;
use lessonbook_shared::{AppError, ErrorCategory};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Any error a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Contract ledger and consumption errors.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Refund workflow errors.
    #[error(transparent)]
    Refund(#[from] RefundError),

    /// Forecast errors.
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// Settlement errors.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Request-level errors (missing headers, bad parameters).
    #[error(transparent)]
    App(#[from] AppError),
}

impl ApiError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::App(AppError::Validation(message.into()))
    }

    /// Returns the taxonomy category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Ledger(err) => err.category(),
            Self::Refund(err) => err.category(),
            Self::Forecast(err) => err.category(),
            Self::Settlement(err) => err.category(),
            Self::App(err) => err.category(),
        }
    }

    /// Returns the fine-grained error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.error_code(),
            Self::Refund(err) => err.error_code(),
            Self::Forecast(err) => err.error_code(),
            Self::Settlement(err) => err.error_code(),
            Self::App(err) => err.error_code(),
        }
    }

    /// Returns the HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.category().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error_code();

        let message = if self.category().is_client_error() {
            self.to_string()
        } else {
            error!(error = %self, code, "Request failed");
            "An internal error occurred".to_string()
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use lessonbook_shared::types::Money;
    use rstest::rstest;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[rstest]
    #[case(ApiError::from(LedgerError::ContractNotFound(Uuid::nil())), 404)]
    #[case(ApiError::from(LedgerError::ContractTerminated), 409)]
    #[case(ApiError::from(LedgerError::NonPositivePayment(Money::ZERO)), 400)]
    #[case(ApiError::from(RefundError::RemarkRequired), 400)]
    #[case(ApiError::from(ForecastError::Locked { period_key: "2025-W10".to_string() }), 423)]
    #[case(ApiError::from(SettlementError::Database("down".to_string())), 500)]
    #[case(ApiError::validation("bad header"), 400)]
    fn test_status_mapping(#[case] err: ApiError, #[case] status: u16) {
        assert_eq!(err.status().as_u16(), status);
    }

    #[tokio::test]
    async fn test_client_error_body() {
        let response = ApiError::from(RefundError::ConflictingRequest {
            contract_id: Uuid::nil(),
            existing: Uuid::nil(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["error"], "CONFLICTING_REQUEST");
        assert!(body["message"].as_str().unwrap().contains("in flight"));
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response =
            ApiError::from(LedgerError::Database("password=hunter2".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "DATABASE_ERROR");
        assert_eq!(body["message"], "An internal error occurred");
    }
}
