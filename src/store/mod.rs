//! Storage seam for progress tracking.
//!
//! Writes to progress and enrollment rows are compare-and-swap on the row's
//! `version`: callers read, compute, and hand back the modified row; the store
//! persists it only if nobody else wrote in between.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        catalog::{Course, Lesson},
        enrollment::Enrollment,
        lesson_progress::LessonProgress,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, AppError>;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    // === Catalog (read-only) ===

    async fn find_course(&self, course_id: i64) -> StoreResult<Option<Course>>;

    async fn find_lesson(&self, lesson_id: i64) -> StoreResult<Option<Lesson>>;

    /// Published lessons of a course, ordered by position.
    async fn published_lessons(&self, course_id: i64) -> StoreResult<Vec<Lesson>>;

    // === Enrollments ===

    async fn find_enrollment(&self, enrollment_id: i64) -> StoreResult<Option<Enrollment>>;

    async fn find_enrollment_for(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>>;

    async fn list_enrollments(&self, student_id: i64) -> StoreResult<Vec<Enrollment>>;

    /// Inserts an ACTIVE enrollment. Fails with `AlreadyEnrolled` if the
    /// (student, course) pair already has a row.
    async fn insert_enrollment(
        &self,
        student_id: i64,
        course_id: i64,
        total_lessons: i32,
    ) -> StoreResult<Enrollment>;

    /// Writes `enrollment` if the stored version still equals `enrollment.version`.
    /// Returns the stored row with its new version, or `None` on a lost race.
    async fn update_enrollment(&self, enrollment: &Enrollment) -> StoreResult<Option<Enrollment>>;

    // === Lesson progress ===

    async fn find_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<Option<LessonProgress>>;

    /// Returns the existing row, creating a NOT_STARTED one first if needed.
    async fn get_or_insert_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<LessonProgress>;

    /// Compare-and-swap, same contract as `update_enrollment`.
    async fn update_lesson_progress(
        &self,
        progress: &LessonProgress,
    ) -> StoreResult<Option<LessonProgress>>;

    async fn list_lesson_progress(&self, enrollment_id: i64) -> StoreResult<Vec<LessonProgress>>;

    async fn count_completed_lessons(&self, enrollment_id: i64) -> StoreResult<i64>;
}
