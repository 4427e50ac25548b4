// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::lesson_progress::{ProgressUpdate, SlideViewRequest},
    services::LessonProgressTracker,
    utils::jwt::Claims,
};

/// Returns the lesson's progress row, creating an empty one on first access.
pub async fn get_lesson_progress(
    State(tracker): State<LessonProgressTracker>,
    Extension(claims): Extension<Claims>,
    Path((enrollment_id, lesson_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;
    let progress = tracker
        .get_or_create(student_id, enrollment_id, lesson_id)
        .await?;
    Ok(Json(progress))
}

/// Records a slide-view beacon.
///
/// Safe to fire concurrently; views merge monotonically regardless of arrival order.
pub async fn record_slide_view(
    State(tracker): State<LessonProgressTracker>,
    Extension(claims): Extension<Claims>,
    Path((enrollment_id, lesson_id)): Path<(i64, i64)>,
    Json(payload): Json<SlideViewRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student_id = claims.student_id()?;

    let progress = tracker
        .record_slide_view(
            student_id,
            enrollment_id,
            lesson_id,
            payload.slide_index,
            payload.seconds_spent,
        )
        .await?;
    Ok(Json(progress))
}

/// Explicit progress update. Lowering a monotonic field is rejected with 400.
pub async fn set_progress(
    State(tracker): State<LessonProgressTracker>,
    Extension(claims): Extension<Claims>,
    Path((enrollment_id, lesson_id)): Path<(i64, i64)>,
    Json(payload): Json<ProgressUpdate>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student_id = claims.student_id()?;

    let progress = tracker
        .set_progress(student_id, enrollment_id, lesson_id, &payload)
        .await?;
    Ok(Json(progress))
}
