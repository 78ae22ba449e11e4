//! Error types for the library catalog server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::book_instance::LoanStatusKind;

/// Machine-readable error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Failure,
    NotAuthenticated,
    PermissionDenied,
    NotFound,
    BadValue,
    PastDate,
    TooFarAhead,
    IllegalTransition,
    NotOnLoan,
    Conflict,
    DbFailure,
}

/// Renewal date rejected by the renewal policy
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalError {
    #[error("Invalid date - renewal in past")]
    PastDate,

    #[error("Invalid date - renewal more than 3 weeks ahead")]
    TooFarAhead,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Renewal(#[from] RenewalError),

    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition {
        from: LoanStatusKind,
        to: LoanStatusKind,
    },

    #[error("Book instance {0} is not on loan")]
    NotOnLoan(uuid::Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    #[schema(value_type = String)]
    pub code: ErrorCode,
    pub message: String,
    /// Input field the error refers to, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorCode, Option<&'static str>) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, None),
            AppError::PermissionDenied(_) => (StatusCode::FORBIDDEN, ErrorCode::PermissionDenied, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, None),
            AppError::Renewal(RenewalError::PastDate) => {
                (StatusCode::BAD_REQUEST, ErrorCode::PastDate, Some("due_back"))
            }
            AppError::Renewal(RenewalError::TooFarAhead) => {
                (StatusCode::BAD_REQUEST, ErrorCode::TooFarAhead, Some("due_back"))
            }
            AppError::IllegalTransition { .. } => {
                (StatusCode::CONFLICT, ErrorCode::IllegalTransition, Some("status"))
            }
            AppError::NotOnLoan(_) => (StatusCode::CONFLICT, ErrorCode::NotOnLoan, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Conflict, None),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure, None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure, None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, field) = self.parts();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::PermissionDenied(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code,
            message,
            field: field.map(str::to_string),
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
