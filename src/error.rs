use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::lifecycle::LifecycleError};

/// Errors that can occur in service layer operations. One variant per
/// condition in the boundary error taxonomy, plus storage wrappers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The actor is not allowed to perform this transition.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The request conflicts with current state (duplicate active post,
    /// already joined, lost race).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Transition attempted from the wrong status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The post's deadline has passed.
    #[error("expired: {0}")]
    Expired(String),
    /// The roster is at capacity.
    #[error("full: {0}")]
    Full(String),
    /// Malformed or inconsistent input.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Storage backend failed mid-operation.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        match err {
            LifecycleError::IncompatibleGameType { .. }
            | LifecycleError::PartyRequired
            | LifecycleError::PartyTooSmall { .. } => ServiceError::Validation(message),
            LifecycleError::NotPartyOwner
            | LifecycleError::NoEligibleParty { .. }
            | LifecycleError::NotAParticipant
            | LifecycleError::NotACaptain
            | LifecycleError::ResultNotSelf
            | LifecycleError::NotPostCreator => ServiceError::Forbidden(message),
            LifecycleError::DuplicateActivePost | LifecycleError::AlreadyJoined => {
                ServiceError::Conflict(message)
            }
            LifecycleError::GameFull => ServiceError::Full(message),
            LifecycleError::WrongStatus { .. } => ServiceError::InvalidState(message),
            LifecycleError::DeadlinePassed => ServiceError::Expired(message),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The targeted post has expired.
    #[error("gone: {0}")]
    Gone(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::Conflict(message)
            | ServiceError::InvalidState(message)
            | ServiceError::Full(message) => AppError::Conflict(message),
            ServiceError::Expired(message) => AppError::Gone(message),
            ServiceError::Validation(message) => AppError::BadRequest(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PostStatus;

    #[test]
    fn lifecycle_errors_map_to_taxonomy() {
        assert!(matches!(
            ServiceError::from(LifecycleError::GameFull),
            ServiceError::Full(_)
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::DeadlinePassed),
            ServiceError::Expired(_)
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::AlreadyJoined),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::WrongStatus {
                actual: PostStatus::Open,
                expected: PostStatus::InProgress
            }),
            ServiceError::InvalidState(_)
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::NotACaptain),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::PartyRequired),
            ServiceError::Validation(_)
        ));
    }

    #[test]
    fn expired_surfaces_as_gone() {
        let app: AppError = ServiceError::Expired("game post has expired".into()).into();
        assert!(matches!(app, AppError::Gone(_)));
    }
}
