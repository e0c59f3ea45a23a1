// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Errors raised by entities, repositories and services.
///
/// Validation variants carry every violated rule, not just the first one.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("quiz validation failed: {}", .0.join("; "))]
    QuizValidation(Vec<String>),

    #[error("submission validation failed: {}", .0.join("; "))]
    SubmissionValidation(Vec<String>),

    #[error("{0}")]
    AuthorExists(String),

    #[error("incorrect email or password")]
    InvalidCredentials,

    /// Retry budget exhausted while the store kept reporting conflicts.
    #[error("max retries exceeded: {0}")]
    MaxRetries(#[source] Box<ServiceError>),

    #[error("repository used outside of an open transaction")]
    TransactionClosed,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn not_found(what: impl fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }
}

/// Postgres reports unique violations with SQLSTATE 23505.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request with every violated rule
    Validation(Vec<String>),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate email)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "details": errors }),
            ),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

/// Translates service failures into their HTTP counterparts.
/// Allows using `?` on service calls inside handlers.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => AppError::NotFound(msg),
            ServiceError::QuizValidation(errors) | ServiceError::SubmissionValidation(errors) => {
                AppError::Validation(errors)
            }
            ServiceError::AuthorExists(msg) => AppError::Conflict(msg),
            ServiceError::InvalidCredentials => AppError::AuthError(err.to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
