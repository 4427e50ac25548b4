//! Postgres-backed `ProgressStore`.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ProgressStore, StoreResult};
use crate::{
    error::AppError,
    models::{
        catalog::{Course, Lesson},
        enrollment::Enrollment,
        lesson_progress::LessonProgress,
    },
};

/// Column list for `lesson_progress` queries.
const PROGRESS_COLUMNS: &str = "\
    id, enrollment_id, lesson_id, status, current_slide_index, \
    total_slides_viewed, time_spent_seconds, started_at, completed_at, \
    updated_at, version";

/// Column list for `enrollments` queries.
const ENROLLMENT_COLUMNS: &str = "\
    id, student_id, course_id, status, lessons_completed, total_lessons, \
    progress_percentage, enrolled_at, last_accessed_at, completed_at, version";

const LESSON_COLUMNS: &str =
    "id, course_id, title, position, slide_count, estimated_minutes, is_published";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn find_course(&self, course_id: i64) -> StoreResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, title, is_published FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn find_lesson(&self, lesson_id: i64) -> StoreResult<Option<Lesson>> {
        let query = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1");
        let lesson = sqlx::query_as::<_, Lesson>(&query)
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lesson)
    }

    async fn published_lessons(&self, course_id: i64) -> StoreResult<Vec<Lesson>> {
        let query = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons \
             WHERE course_id = $1 AND is_published \
             ORDER BY position, id"
        );
        let lessons = sqlx::query_as::<_, Lesson>(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lessons)
    }

    async fn find_enrollment(&self, enrollment_id: i64) -> StoreResult<Option<Enrollment>> {
        let query = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1");
        let enrollment = sqlx::query_as::<_, Enrollment>(&query)
            .bind(enrollment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(enrollment)
    }

    async fn find_enrollment_for(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        let query = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments \
             WHERE student_id = $1 AND course_id = $2"
        );
        let enrollment = sqlx::query_as::<_, Enrollment>(&query)
            .bind(student_id)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(enrollment)
    }

    async fn list_enrollments(&self, student_id: i64) -> StoreResult<Vec<Enrollment>> {
        let query = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments \
             WHERE student_id = $1 \
             ORDER BY enrolled_at DESC, id DESC"
        );
        let enrollments = sqlx::query_as::<_, Enrollment>(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(enrollments)
    }

    async fn insert_enrollment(
        &self,
        student_id: i64,
        course_id: i64,
        total_lessons: i32,
    ) -> StoreResult<Enrollment> {
        let query = format!(
            "INSERT INTO enrollments (student_id, course_id, total_lessons) \
             VALUES ($1, $2, $3) \
             RETURNING {ENROLLMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(student_id)
            .bind(course_id)
            .bind(total_lessons)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                    // A concurrent enroll for the same pair won the insert.
                    AppError::AlreadyEnrolled(course_id)
                } else {
                    tracing::error!("Failed to insert enrollment: {:?}", e);
                    AppError::from(e)
                }
            })
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> StoreResult<Option<Enrollment>> {
        let query = format!(
            "UPDATE enrollments SET \
                status = $3, lessons_completed = $4, total_lessons = $5, \
                progress_percentage = $6, last_accessed_at = $7, completed_at = $8, \
                version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {ENROLLMENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Enrollment>(&query)
            .bind(enrollment.id)
            .bind(enrollment.version)
            .bind(enrollment.status)
            .bind(enrollment.lessons_completed)
            .bind(enrollment.total_lessons)
            .bind(enrollment.progress_percentage)
            .bind(enrollment.last_accessed_at)
            .bind(enrollment.completed_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn find_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<Option<LessonProgress>> {
        let query = format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress \
             WHERE enrollment_id = $1 AND lesson_id = $2"
        );
        let progress = sqlx::query_as::<_, LessonProgress>(&query)
            .bind(enrollment_id)
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(progress)
    }

    async fn get_or_insert_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<LessonProgress> {
        sqlx::query(
            "INSERT INTO lesson_progress (enrollment_id, lesson_id) \
             VALUES ($1, $2) \
             ON CONFLICT (enrollment_id, lesson_id) DO NOTHING",
        )
        .bind(enrollment_id)
        .bind(lesson_id)
        .execute(&self.pool)
        .await?;

        self.find_lesson_progress(enrollment_id, lesson_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "lesson_progress ({}, {}) vanished after insert",
                    enrollment_id, lesson_id
                ))
            })
    }

    async fn update_lesson_progress(
        &self,
        progress: &LessonProgress,
    ) -> StoreResult<Option<LessonProgress>> {
        let query = format!(
            "UPDATE lesson_progress SET \
                status = $3, current_slide_index = $4, total_slides_viewed = $5, \
                time_spent_seconds = $6, started_at = $7, completed_at = $8, \
                updated_at = $9, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {PROGRESS_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, LessonProgress>(&query)
            .bind(progress.id)
            .bind(progress.version)
            .bind(progress.status)
            .bind(progress.current_slide_index)
            .bind(progress.total_slides_viewed)
            .bind(progress.time_spent_seconds)
            .bind(progress.started_at)
            .bind(progress.completed_at)
            .bind(progress.updated_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn list_lesson_progress(&self, enrollment_id: i64) -> StoreResult<Vec<LessonProgress>> {
        let query = format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress \
             WHERE enrollment_id = $1 \
             ORDER BY lesson_id"
        );
        let rows = sqlx::query_as::<_, LessonProgress>(&query)
            .bind(enrollment_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_completed_lessons(&self, enrollment_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lesson_progress \
             WHERE enrollment_id = $1 AND status = 'completed'",
        )
        .bind(enrollment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
