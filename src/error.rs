//! Error types for the grader.
//!
//! Workflow-level errors (validation, scorecard parsing, storage) are
//! reported back to the instructor as notices on the session page; only the
//! machine-facing routes turn them into HTTP error responses via [`AppError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// A required intake field was missing or unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please complete all fields and upload a valid file (missing: {0}).")]
    MissingField(&'static str),

    #[error("Unknown course: {0}")]
    UnknownCourse(String),
}

/// The pasted scorecard was not a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid JSON scorecard: {message}")]
pub struct ParseError {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("No assignment has been processed yet.")]
    NoDocument,

    #[error("Paste a scorecard to compute a score before saving.")]
    NotScored,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv buffer error: {0}")]
    Buffer(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Submission not found: {id}")]
    NotFound { id: i64 },
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Export(_) => "EXPORT_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, status = status.as_u16(), "Server error");
        } else {
            tracing::warn!(error = %message, status = status.as_u16(), "Client error");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.code(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_message_is_prefixed() {
        let err = ParseError {
            message: "expected value at line 1 column 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid JSON scorecard: expected value at line 1 column 1"
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::NotFound { id: 7 };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
