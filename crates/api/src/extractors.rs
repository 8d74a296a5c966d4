//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use lessonbook_shared::types::OperatorId;
use uuid::Uuid;

use crate::error::ApiError;

/// Header naming the staff member performing a mutation.
pub const OPERATOR_HEADER: &str = "x-operator-id";

/// The acting operator, taken from the `X-Operator-Id` header.
///
/// ```ignore
/// async fn handler(Operator(operator): Operator) -> impl IntoResponse {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator(pub OperatorId);

impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OPERATOR_HEADER)
            .ok_or_else(|| ApiError::validation("X-Operator-Id header is required"))?;

        let id = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .filter(|id| !id.is_nil())
            .ok_or_else(|| ApiError::validation("X-Operator-Id must be a non-nil UUID"))?;

        Ok(Self(OperatorId::from_uuid(id)))
    }
}
