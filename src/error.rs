use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::models::TournamentStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Participant already registered")]
    AlreadyRegistered,

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },

    #[error("Tournament is {0} and can no longer be modified")]
    TournamentClosed(TournamentStatus),

    #[error("Tournament is not active")]
    TournamentNotActive,

    #[error("Tournament is not accepting registrations")]
    TournamentNotPending,

    #[error("User is not registered in this tournament")]
    NotRegistered,

    #[error("Results are not available until the tournament is finalized")]
    ResultsNotReady,

    #[error("Failed to finalize tournament: {0}")]
    FinalizeFailed(String),

    #[error("Puzzle service unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyRegistered => "already_registered",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::TournamentClosed(_) => "tournament_closed",
            AppError::TournamentNotActive => "tournament_not_active",
            AppError::TournamentNotPending => "tournament_not_pending",
            AppError::NotRegistered => "not_registered",
            AppError::ResultsNotReady => "results_not_ready",
            AppError::FinalizeFailed(_) => "finalize_failed",
            AppError::CollaboratorUnavailable(_) => "collaborator_unavailable",
            AppError::Database(_) => "storage_failure",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyRegistered
            | AppError::InvalidTransition { .. }
            | AppError::TournamentClosed(_)
            | AppError::TournamentNotActive
            | AppError::TournamentNotPending
            | AppError::NotRegistered
            | AppError::ResultsNotReady => StatusCode::CONFLICT,
            AppError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::FinalizeFailed(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Storage and internal failures are safe to retry as a whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::FinalizeFailed(_)
                | AppError::CollaboratorUnavailable(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::FinalizeFailed(msg) => {
                tracing::error!("Finalize failed: {}", msg);
                "Failed to finalize tournament".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
