//! API error responses.
//!
//! Callers see a stable reason code plus a short message, never internal
//! detail. Storage problems map to 503 so the billing platform's own
//! redelivery kicks in; the idempotency guard makes the replay safe.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use subgate_entitlement::{ReconcileError, StoreError};
use subgate_proof::ProofError;

/// A client-visible request failure.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "invalid or missing client secret",
        )
    }

    #[must_use]
    pub fn service_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            "storage is temporarily unavailable",
        )
    }

    /// The stable reason code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ProofError> for ApiError {
    fn from(err: ProofError) -> Self {
        let status = match &err {
            ProofError::Untrusted | ProofError::ExpiredCert | ProofError::SignatureMismatch => {
                StatusCode::UNAUTHORIZED
            }
            ProofError::Malformed(_)
            | ProofError::UnsupportedAlgorithm(_)
            | ProofError::InvalidClaims(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.reason_code(), err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(_: StoreError) -> Self {
        Self::service_unavailable()
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::EnvironmentMismatch { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                "environment_mismatch",
                err.to_string(),
            ),
            ReconcileError::Conflict | ReconcileError::Storage(_) => Self::service_unavailable(),
        }
    }
}
