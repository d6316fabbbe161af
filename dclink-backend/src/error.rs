use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy for the telemetry sources (query protocol, rcon, HTTP
/// fallback). Both variants are recoverable: callers fall back to the sticky
/// cache or skip the feature for the cycle, they never crash on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SourceError {
  /// Transport timeout, connection error, or malformed protocol payload.
  #[error("source unavailable")]
  Unavailable,

  /// A required endpoint or credential is absent from the configuration.
  #[error("source not configured")]
  NotConfigured,
}

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
  DatabaseError(dclink_db::DbError),
  ValidationError(String),
  Unauthorized,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::DatabaseError(db_err) => {
        // Log the detailed error server-side
        tracing::error!(?db_err, "Database error occurred");

        // Return user-friendly error to client
        let (status, message) = match db_err {
          dclink_db::DbError::AccountNotFound => {
            (StatusCode::NOT_FOUND, "No linked account found")
          }
          dclink_db::DbError::AlreadyLinked => {
            (StatusCode::CONFLICT, "Account is already linked")
          }
          dclink_db::DbError::RegistrationFull => {
            (StatusCode::CONFLICT, "Registration limit reached")
          }
          dclink_db::DbError::Sqlite(_) | dclink_db::DbError::Connection(_) => {
            // Don't expose internal database errors
            tracing::error!("Internal database error: {:?}", db_err);
            (
              StatusCode::INTERNAL_SERVER_ERROR,
              "An internal error occurred. Please try again later.",
            )
          }
        };

        let error_response = ErrorResponse::new(message);
        (status, Json(error_response)).into_response()
      }
      AppError::ValidationError(msg) => {
        tracing::warn!(validation_error = %msg, "Validation failed");
        let error_response = ErrorResponse::new(msg);
        (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
      }
      AppError::Unauthorized => {
        let error_response = ErrorResponse::new("Invalid API key");
        (StatusCode::UNAUTHORIZED, Json(error_response)).into_response()
      }
    }
  }
}

impl From<dclink_db::DbError> for AppError {
  fn from(err: dclink_db::DbError) -> Self {
    AppError::DatabaseError(err)
  }
}

impl From<crate::validation::ValidationError> for AppError {
  fn from(err: crate::validation::ValidationError) -> Self {
    AppError::ValidationError(err.to_string())
  }
}
