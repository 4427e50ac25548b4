// src/models/enrollment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::percent::round_percentage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Dropped,
}

/// Represents the 'enrollments' table: one row per (student, course).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub status: EnrollmentStatus,

    /// Denormalized count of COMPLETED lesson-progress rows. Always recomputed.
    pub lessons_completed: i32,

    /// Published lessons in the course at enrollment time.
    pub total_lessons: i32,

    /// 0..=100, rounded half-up.
    pub progress_percentage: i32,

    pub enrolled_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub version: i64,
}

impl Enrollment {
    pub fn is_dropped(&self) -> bool {
        self.status == EnrollmentStatus::Dropped
    }

    /// Counters recomputed from a fresh count of completed lessons.
    ///
    /// The count is capped at `total_lessons`: rows for lessons published
    /// after enrollment do not push the counter past the course size.
    /// Reaching 100% flips an active enrollment to `Completed` once; the flag
    /// and `completed_at` are never cleared afterwards. A dropped enrollment
    /// keeps its status and only has its counters refreshed.
    pub fn with_completed_lessons(&self, lessons_completed: i64, now: DateTime<Utc>) -> Self {
        let total = i64::from(self.total_lessons.max(0));
        let lessons_completed = lessons_completed.clamp(0, total);

        let mut next = self.clone();
        next.lessons_completed = i32::try_from(lessons_completed).unwrap_or(i32::MAX);
        next.progress_percentage = round_percentage(lessons_completed, total);
        next.last_accessed_at = Some(now);

        if next.progress_percentage == 100 && next.status == EnrollmentStatus::Active {
            next.status = EnrollmentStatus::Completed;
            next.completed_at.get_or_insert(now);
        }
        next
    }

    /// True when a recount of `lessons_completed` would change the stored
    /// counters or status.
    pub fn is_stale(&self, lessons_completed: i64) -> bool {
        let next = self.with_completed_lessons(lessons_completed, Utc::now());
        next.lessons_completed != self.lessons_completed
            || next.progress_percentage != self.progress_percentage
            || next.status != self.status
    }

    /// Brings a dropped enrollment back without touching its counters.
    ///
    /// An enrollment that was already at 100% when dropped comes back as
    /// `Completed`, keeping status and percentage in agreement.
    pub fn reactivated(&self) -> Self {
        let mut next = self.clone();
        if self.progress_percentage == 100 {
            next.status = EnrollmentStatus::Completed;
            next.completed_at.get_or_insert_with(Utc::now);
        } else {
            next.status = EnrollmentStatus::Active;
        }
        next
    }

    pub fn dropped(&self) -> Self {
        let mut next = self.clone();
        next.status = EnrollmentStatus::Dropped;
        next
    }
}

/// DTO for enrolling the current student into a course.
#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    #[validate(range(min = 1, message = "course_id must be positive"))]
    pub course_id: i64,
}
