// src/handlers/enrollment.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::enrollment::EnrollRequest,
    services::{CourseProgressView, EnrollmentAggregator},
    utils::jwt::Claims,
};

/// Enrolls the current student into a published course.
///
/// Returns 201 for a new enrollment, 200 when a dropped one is reactivated.
pub async fn enroll(
    State(aggregator): State<EnrollmentAggregator>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student_id = claims.student_id()?;

    let (enrollment, created) = aggregator.enroll(student_id, payload.course_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(enrollment)))
}

/// Lists the current student's enrollments, newest first.
pub async fn list_enrollments(
    State(aggregator): State<EnrollmentAggregator>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;
    let enrollments = aggregator.list_enrollments(student_id).await?;
    Ok(Json(enrollments))
}

pub async fn get_enrollment(
    State(aggregator): State<EnrollmentAggregator>,
    Extension(claims): Extension<Claims>,
    Path(enrollment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;
    let enrollment = aggregator.get_enrollment(student_id, enrollment_id).await?;
    Ok(Json(enrollment))
}

/// Drops the enrollment. Progress is kept in case the student comes back.
pub async fn unenroll(
    State(aggregator): State<EnrollmentAggregator>,
    Extension(claims): Extension<Claims>,
    Path(enrollment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;
    aggregator.unenroll(student_id, enrollment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Consolidated progress report for one enrollment.
pub async fn get_course_progress(
    State(view): State<CourseProgressView>,
    Extension(claims): Extension<Claims>,
    Path(enrollment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;
    let report = view.get_course_progress(student_id, enrollment_id).await?;
    Ok(Json(report))
}
