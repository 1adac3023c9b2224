//! Error types for timeline-service.
//!
//! Synchronous request-path failures map to HTTP responses here; fan-out
//! failures never reach this type because the triggering request has
//! already returned (workers log and move on).

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for timeline-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected input: self-follow, empty/oversized content, duplicate
    /// follow, unfollow of a missing edge. No state was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Post/user lookup miss on a read path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store failure (timeout, unavailability) on the request path.
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}
