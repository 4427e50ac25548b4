// src/services/aggregator.rs

use std::sync::Arc;

use chrono::Utc;

use super::{load_owned_enrollment, retries_exhausted};
use crate::{
    error::AppError,
    models::enrollment::{Enrollment, EnrollmentStatus},
    store::ProgressStore,
};

/// Owns the enrollment lifecycle and its denormalized completion counters.
#[derive(Clone)]
pub struct EnrollmentAggregator {
    store: Arc<dyn ProgressStore>,
    max_write_retries: u32,
}

impl EnrollmentAggregator {
    pub fn new(store: Arc<dyn ProgressStore>, max_write_retries: u32) -> Self {
        Self {
            store,
            max_write_retries,
        }
    }

    /// Recounts completed lessons and rewrites the enrollment's counters.
    ///
    /// The enrollment is read before the count, so a write that survives the
    /// version check always saw every completion committed before it.
    pub async fn recompute_on_lesson_completed(
        &self,
        enrollment_id: i64,
    ) -> Result<Enrollment, AppError> {
        for attempt in 1..=self.max_write_retries {
            let current = self
                .store
                .find_enrollment(enrollment_id)
                .await?
                .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

            let completed = self.store.count_completed_lessons(enrollment_id).await?;
            let next = current.with_completed_lessons(completed, Utc::now());

            match self.store.update_enrollment(&next).await? {
                Some(saved) => {
                    if saved.status == EnrollmentStatus::Completed
                        && current.status != EnrollmentStatus::Completed
                    {
                        tracing::info!(
                            enrollment_id,
                            student_id = saved.student_id,
                            course_id = saved.course_id,
                            "enrollment completed"
                        );
                    }
                    return Ok(saved);
                }
                None => {
                    tracing::debug!(enrollment_id, attempt, "enrollment write lost a race, retrying");
                }
            }
        }

        Err(retries_exhausted("enrollment", enrollment_id, self.max_write_retries))
    }

    /// Recounts only when the stored counters disagree with the completed rows.
    ///
    /// Repairs an enrollment whose cascade failed after a lesson row was saved.
    pub async fn reconcile_completed_lessons(
        &self,
        enrollment_id: i64,
    ) -> Result<Enrollment, AppError> {
        let current = self
            .store
            .find_enrollment(enrollment_id)
            .await?
            .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;
        let completed = self.store.count_completed_lessons(enrollment_id).await?;

        if !current.is_stale(completed) {
            return Ok(current);
        }
        tracing::info!(
            enrollment_id,
            stored = current.lessons_completed,
            completed,
            "enrollment counters stale, recomputing"
        );
        self.recompute_on_lesson_completed(enrollment_id).await
    }

    /// Enrolls a student, or reactivates their dropped enrollment.
    ///
    /// Returns the enrollment and whether a new row was created.
    pub async fn enroll(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<(Enrollment, bool), AppError> {
        let course = self
            .store
            .find_course(course_id)
            .await?
            .ok_or(AppError::NotFound("Course not found".to_string()))?;

        if !course.is_published {
            return Err(AppError::CourseNotPublished(course_id));
        }

        for attempt in 1..=self.max_write_retries {
            match self.store.find_enrollment_for(student_id, course_id).await? {
                Some(existing) if existing.is_dropped() => {
                    if let Some(saved) = self.store.update_enrollment(&existing.reactivated()).await? {
                        tracing::info!(enrollment_id = saved.id, student_id, course_id, "enrollment reactivated");
                        return Ok((saved, false));
                    }
                    tracing::debug!(enrollment_id = existing.id, attempt, "reactivation lost a race, retrying");
                }
                Some(_) => return Err(AppError::AlreadyEnrolled(course_id)),
                None => {
                    let total_lessons = self.store.published_lessons(course_id).await?.len();
                    let total_lessons = i32::try_from(total_lessons).map_err(|_| {
                        AppError::InternalServerError("lesson count overflows i32".to_string())
                    })?;

                    let created = self
                        .store
                        .insert_enrollment(student_id, course_id, total_lessons)
                        .await?;
                    tracing::info!(enrollment_id = created.id, student_id, course_id, total_lessons, "student enrolled");
                    return Ok((created, true));
                }
            }
        }

        Err(retries_exhausted("enrollment for course", course_id, self.max_write_retries))
    }

    /// Marks the enrollment DROPPED. Progress history is kept for reactivation.
    pub async fn unenroll(&self, student_id: i64, enrollment_id: i64) -> Result<(), AppError> {
        for attempt in 1..=self.max_write_retries {
            let current = load_owned_enrollment(self.store.as_ref(), student_id, enrollment_id).await?;
            if current.is_dropped() {
                return Ok(());
            }

            if self.store.update_enrollment(&current.dropped()).await?.is_some() {
                tracing::info!(enrollment_id, student_id, "enrollment dropped");
                return Ok(());
            }
            tracing::debug!(enrollment_id, attempt, "unenroll lost a race, retrying");
        }

        Err(retries_exhausted("enrollment", enrollment_id, self.max_write_retries))
    }

    pub async fn get_enrollment(
        &self,
        student_id: i64,
        enrollment_id: i64,
    ) -> Result<Enrollment, AppError> {
        load_owned_enrollment(self.store.as_ref(), student_id, enrollment_id).await
    }

    pub async fn list_enrollments(&self, student_id: i64) -> Result<Vec<Enrollment>, AppError> {
        self.store.list_enrollments(student_id).await
    }
}
