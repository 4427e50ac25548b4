// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, PartialEq, Eq)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (negative slide index, negative duration, ...)
    BadRequest(String),

    // 400 Bad Request: an update tried to move a monotonic field backward
    InvalidProgressRegression(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden: no usable enrollment links the caller to the lesson
    NotEnrolled(String),

    // 404 Not Found
    NotFound(String),

    // 404 Not Found: unknown or unpublished lesson
    LessonNotFound(i64),

    // 409 Conflict: an ACTIVE or COMPLETED enrollment already exists
    AlreadyEnrolled(i64),

    // 409 Conflict: optimistic write retries exhausted, safe to retry
    Conflict(String),

    // 422 Unprocessable Entity: enrolling into an unpublished course
    CourseNotPublished(i64),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::InvalidProgressRegression(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotEnrolled(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::LessonNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyEnrolled(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::CourseNotPublished(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::InvalidProgressRegression(field) => {
                format!("'{}' cannot be lower than the recorded value", field)
            }
            AppError::LessonNotFound(id) => format!("Lesson {} not found", id),
            AppError::AlreadyEnrolled(course_id) => {
                format!("Already enrolled in course {}", course_id)
            }
            AppError::CourseNotPublished(course_id) => {
                format!("Course {} is not published", course_id)
            }
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::NotEnrolled(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg,
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
