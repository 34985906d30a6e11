//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use topup_core::TopupError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid gateway identity.
    #[error("unauthorized")]
    Unauthorized,

    /// Signature or credential check failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - the charge is not in the expected state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Settlement data disagrees with the attached session.
    #[error("mismatch on {field}")]
    Mismatch {
        /// The field that disagrees.
        field: &'static str,
        /// Value recorded at session creation.
        attached: String,
        /// Value reported on completion.
        reported: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// Error response body.
///
/// Also attached to the response extensions so that content negotiation can
/// re-encode it without parsing the JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                msg.clone(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::Mismatch {
                field,
                attached,
                reported,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "settlement_mismatch",
                self.to_string(),
                Some(serde_json::json!({
                    "field": field,
                    "attached": attached,
                    "reported": reported,
                })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

impl From<TopupError> for ApiError {
    fn from(err: TopupError) -> Self {
        match err {
            TopupError::Validation(msg) => Self::BadRequest(msg),
            TopupError::Authentication(msg) => Self::Authentication(msg),
            TopupError::Conflict(msg) => Self::Conflict(msg),
            TopupError::Mismatch {
                field,
                attached,
                reported,
            } => Self::Mismatch {
                field,
                attached,
                reported,
            },
            TopupError::NotFound(msg) => Self::NotFound(msg),
            TopupError::Upstream { service, message } => {
                Self::ExternalService(format!("{service}: {message}"))
            }
        }
    }
}

impl From<crate::ledger::LedgerError> for ApiError {
    fn from(err: crate::ledger::LedgerError) -> Self {
        TopupError::from(err).into()
    }
}
