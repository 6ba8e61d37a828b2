//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use crate::errors::{FairwayError, PressError, SettlementError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_FOUND, BAD_REQUEST, CONFLICT, etc.)
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Conflict(String),
    InternalError(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn new(request_id: &str, kind: ApiErrorKind) -> Self {
        Self {
            kind,
            request_id: request_id.to_string(),
        }
    }

    pub fn bad_request(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, ApiErrorKind::BadRequest(message.into()))
    }

    pub fn forbidden(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, ApiErrorKind::Forbidden(message.into()))
    }

    pub fn not_found(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, ApiErrorKind::NotFound(message.into()))
    }

    /// Map an engine error onto the status a client should see
    pub fn from_fairway(request_id: &str, err: FairwayError) -> Self {
        use crate::errors::ValidationError as V;
        let message = err.to_string();
        let kind = match err {
            FairwayError::Validation(V::Unauthorized(_)) => ApiErrorKind::Forbidden(message),
            FairwayError::Validation(V::InvalidRound(_) | V::UnknownTournament(_)) => {
                ApiErrorKind::NotFound(message)
            }
            FairwayError::Validation(_) => ApiErrorKind::BadRequest(message),
            FairwayError::Press(PressError::NotFound(_)) => ApiErrorKind::NotFound(message),
            FairwayError::Press(PressError::NotTarget(_)) => ApiErrorKind::Forbidden(message),
            FairwayError::Press(PressError::NotMeasured(_)) => ApiErrorKind::BadRequest(message),
            FairwayError::Press(_) => ApiErrorKind::Conflict(message),
            FairwayError::Storage(StorageError::Conflict { .. }) => ApiErrorKind::Conflict(message),
            FairwayError::Settlement(e) => return Self::from_settlement(request_id, e),
            FairwayError::Storage(_) | FairwayError::Configuration(_) => {
                ApiErrorKind::InternalError(message)
            }
        };
        Self::new(request_id, kind)
    }

    pub fn from_settlement(request_id: &str, err: SettlementError) -> Self {
        let message = err.to_string();
        let kind = match err {
            SettlementError::Validation(v) => return Self::from_fairway(request_id, v.into()),
            SettlementError::Contention { .. } => ApiErrorKind::ServiceUnavailable(message),
            SettlementError::Storage(_) | SettlementError::Dropped => {
                ApiErrorKind::InternalError(message)
            }
        };
        Self::new(request_id, kind)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Forbidden(msg) => write!(f, "[{}] Forbidden: {}", self.request_id, msg),
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
            ApiErrorKind::ServiceUnavailable(msg) => write!(f, "[{}] Service Unavailable: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiErrorKind::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiErrorKind::InternalError(msg) => {
                tracing::error!(request_id = %self.request_id, "Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
            ApiErrorKind::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
