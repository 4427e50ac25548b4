// src/services/mod.rs

pub mod aggregator;
pub mod tracker;
pub mod view;

pub use aggregator::EnrollmentAggregator;
pub use tracker::LessonProgressTracker;
pub use view::CourseProgressView;

use crate::{error::AppError, models::enrollment::Enrollment, store::ProgressStore};

/// Loads an enrollment and checks that it belongs to `student_id`.
async fn load_owned_enrollment(
    store: &dyn ProgressStore,
    student_id: i64,
    enrollment_id: i64,
) -> Result<Enrollment, AppError> {
    let enrollment = store
        .find_enrollment(enrollment_id)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    if enrollment.student_id != student_id {
        return Err(AppError::NotEnrolled(
            "Enrollment belongs to another student".to_string(),
        ));
    }
    Ok(enrollment)
}

/// The error surfaced once every optimistic write attempt lost its race.
fn retries_exhausted(row: &str, id: i64, attempts: u32) -> AppError {
    tracing::warn!(row, id, attempts, "optimistic write retries exhausted");
    AppError::Conflict(format!(
        "Concurrent updates to {} {}, please retry",
        row, id
    ))
}
