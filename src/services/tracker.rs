// src/services/tracker.rs

use std::sync::Arc;

use chrono::Utc;

use super::{EnrollmentAggregator, load_owned_enrollment, retries_exhausted};
use crate::{
    error::AppError,
    models::{
        catalog::Lesson,
        lesson_progress::{LessonProgress, LessonStatus, ProgressUpdate},
    },
    store::ProgressStore,
};

/// Applies slide-view and explicit progress updates to single lesson-progress rows.
#[derive(Clone)]
pub struct LessonProgressTracker {
    store: Arc<dyn ProgressStore>,
    aggregator: EnrollmentAggregator,
    max_write_retries: u32,
}

impl LessonProgressTracker {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        aggregator: EnrollmentAggregator,
        max_write_retries: u32,
    ) -> Self {
        Self {
            store,
            aggregator,
            max_write_retries,
        }
    }

    /// Returns the progress row for the pair, creating a NOT_STARTED one on first access.
    pub async fn get_or_create(
        &self,
        student_id: i64,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> Result<LessonProgress, AppError> {
        self.authorize(student_id, enrollment_id, lesson_id).await?;
        self.store
            .get_or_insert_lesson_progress(enrollment_id, lesson_id)
            .await
    }

    /// Merges a slide-view event. Completing the lesson cascades into the enrollment.
    pub async fn record_slide_view(
        &self,
        student_id: i64,
        enrollment_id: i64,
        lesson_id: i64,
        slide_index: i32,
        seconds_spent: i64,
    ) -> Result<LessonProgress, AppError> {
        if slide_index < 0 {
            return Err(AppError::BadRequest(
                "slide_index must not be negative".to_string(),
            ));
        }
        if seconds_spent < 0 {
            return Err(AppError::BadRequest(
                "seconds_spent must not be negative".to_string(),
            ));
        }

        let lesson = self.authorize(student_id, enrollment_id, lesson_id).await?;

        self.write(enrollment_id, lesson_id, |current| {
            Ok(current.apply_slide_view(slide_index, seconds_spent, lesson.slide_count, Utc::now()))
        })
        .await
    }

    /// Direct "mark progress" update. Monotonic fields cannot move backward.
    pub async fn set_progress(
        &self,
        student_id: i64,
        enrollment_id: i64,
        lesson_id: i64,
        update: &ProgressUpdate,
    ) -> Result<LessonProgress, AppError> {
        let lesson = self.authorize(student_id, enrollment_id, lesson_id).await?;

        if update.is_empty() {
            return self
                .store
                .get_or_insert_lesson_progress(enrollment_id, lesson_id)
                .await;
        }

        self.write(enrollment_id, lesson_id, |current| {
            current.apply_update(update, lesson.slide_count, Utc::now())
        })
        .await
    }

    /// Read-compute-write loop on one row, retried while other writers win the version check.
    async fn write<F>(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
        mut compute: F,
    ) -> Result<LessonProgress, AppError>
    where
        F: FnMut(&LessonProgress) -> Result<LessonProgress, AppError> + Send,
    {
        for attempt in 1..=self.max_write_retries {
            let current = self
                .store
                .get_or_insert_lesson_progress(enrollment_id, lesson_id)
                .await?;
            let next = compute(&current)?;

            let Some(saved) = self.store.update_lesson_progress(&next).await? else {
                tracing::debug!(enrollment_id, lesson_id, attempt, "lesson progress write lost a race, retrying");
                continue;
            };

            if saved.completes(&current) {
                tracing::info!(enrollment_id, lesson_id, "lesson completed");
                self.sync_enrollment(enrollment_id, true).await;
            } else if saved.status == LessonStatus::Completed {
                self.sync_enrollment(enrollment_id, false).await;
            }
            return Ok(saved);
        }

        Err(retries_exhausted("lesson progress", lesson_id, self.max_write_retries))
    }

    /// Brings the enrollment counters up to date after a saved lesson write.
    ///
    /// The lesson row is already committed, so a failure here is logged and
    /// not returned. The next write on a completed lesson reconciles.
    async fn sync_enrollment(&self, enrollment_id: i64, just_completed: bool) {
        let result = if just_completed {
            self.aggregator
                .recompute_on_lesson_completed(enrollment_id)
                .await
        } else {
            self.aggregator
                .reconcile_completed_lessons(enrollment_id)
                .await
        };

        if let Err(e) = result {
            tracing::warn!(enrollment_id, error = %e, "enrollment counters left stale");
        }
    }

    /// Checks the caller may record progress for this lesson under this enrollment.
    async fn authorize(
        &self,
        student_id: i64,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> Result<Lesson, AppError> {
        let enrollment =
            load_owned_enrollment(self.store.as_ref(), student_id, enrollment_id).await?;
        if enrollment.is_dropped() {
            return Err(AppError::NotEnrolled(
                "Enrollment has been dropped".to_string(),
            ));
        }

        let lesson = self
            .store
            .find_lesson(lesson_id)
            .await?
            .filter(|l| l.is_published)
            .ok_or(AppError::LessonNotFound(lesson_id))?;

        if lesson.course_id != enrollment.course_id {
            return Err(AppError::NotEnrolled(
                "Lesson belongs to a course outside this enrollment".to_string(),
            ));
        }
        Ok(lesson)
    }
}
