use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::{Abort, StorageError, TxError},
    dto::matching::{MatchingFailure, MatchingFailureReason},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// A matching run produced no battle.
    #[error("{}", .0.message)]
    Matching(MatchingFailure),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<Abort> for ServiceError {
    fn from(abort: Abort) -> Self {
        let message = abort.to_string();
        match abort {
            Abort::BattleNotFound(_) | Abort::ContentNotFound(_) => ServiceError::NotFound(message),
            Abort::NotOwner(_) => ServiceError::Unauthorized(message),
            Abort::ContentUnavailable(_)
            | Abort::ContentInBattle(_)
            | Abort::BattleEnded(_)
            | Abort::AlreadyVoted { .. } => ServiceError::InvalidState(message),
        }
    }
}

impl From<TxError> for ServiceError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Aborted(abort) => abort.into(),
            TxError::Storage(storage) => storage.into(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
    /// Matching run failure carrying diagnostics.
    #[error("{}", .0.message)]
    Matching(MatchingFailure),
}

impl AppError {
    fn reason(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ServiceUnavailable(_) | AppError::Internal(_) => "system",
            AppError::Matching(failure) => failure.reason.as_str(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Matching(failure) => match failure.reason {
                MatchingFailureReason::SystemError => StatusCode::SERVICE_UNAVAILABLE,
                MatchingFailureReason::InsufficientContenders
                | MatchingFailureReason::NoValidMatches => StatusCode::CONFLICT,
            },
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Matching(failure) => AppError::Matching(failure),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<MatchingFailure>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let reason = self.reason();
        let message = self.to_string();
        let details = match self {
            AppError::Matching(failure) => Some(failure),
            _ => None,
        };

        let payload = Json(ErrorBody {
            success: false,
            message,
            reason,
            details,
        });

        (status, payload).into_response()
    }
}
