// src/models/lesson_progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Lesson-level status. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "lesson_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl LessonStatus {
    /// Status after some activity on the lesson.
    ///
    /// Full slide coverage completes the lesson; anything else moves it to
    /// `InProgress`. `Completed` never goes back.
    pub fn after_activity(self, total_slides_viewed: i32, slide_count: i32) -> Self {
        if self == LessonStatus::Completed || total_slides_viewed >= slide_count {
            LessonStatus::Completed
        } else {
            LessonStatus::InProgress
        }
    }
}

/// Represents the 'lesson_progress' table: one row per (enrollment, lesson).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: i64,
    pub enrollment_id: i64,
    pub lesson_id: i64,
    pub status: LessonStatus,

    /// Last slide the student navigated to. Navigation can go backward.
    pub current_slide_index: i32,

    /// Distinct slide positions reached. Never decreases, never exceeds the slide count.
    pub total_slides_viewed: i32,

    /// Sum of every reported viewing interval. Never decreases.
    pub time_spent_seconds: i64,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency token, bumped by the store on every write.
    #[serde(skip)]
    pub version: i64,
}

impl LessonProgress {
    /// A fresh row for a pair that has no recorded activity yet.
    pub fn not_started(id: i64, enrollment_id: i64, lesson_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            enrollment_id,
            lesson_id,
            status: LessonStatus::NotStarted,
            current_slide_index: 0,
            total_slides_viewed: 0,
            time_spent_seconds: 0,
            started_at: None,
            completed_at: None,
            updated_at: now,
            version: 0,
        }
    }

    /// Merges one slide-view event into the row.
    ///
    /// Slide coverage takes the max (clamped to `slide_count`), time is additive,
    /// and the navigation position is last-write-wins.
    pub fn apply_slide_view(
        &self,
        slide_index: i32,
        seconds_spent: i64,
        slide_count: i32,
        now: DateTime<Utc>,
    ) -> Self {
        let reached = slide_index.saturating_add(1).min(slide_count.max(0));
        let total_slides_viewed = self.total_slides_viewed.max(reached);

        let mut next = self.clone();
        next.current_slide_index = slide_index;
        next.total_slides_viewed = total_slides_viewed;
        next.time_spent_seconds = self.time_spent_seconds.saturating_add(seconds_spent);
        next.touch(slide_count, now);
        next
    }

    /// Applies an explicit partial update.
    ///
    /// Monotonic fields may only stay put or grow; a lower value is rejected
    /// rather than clamped.
    pub fn apply_update(
        &self,
        update: &ProgressUpdate,
        slide_count: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        update.validate()?;

        let mut next = self.clone();

        if let Some(total) = update.total_slides_viewed {
            if total < self.total_slides_viewed {
                return Err(AppError::InvalidProgressRegression(
                    "total_slides_viewed".to_string(),
                ));
            }
            if total > slide_count {
                return Err(AppError::BadRequest(format!(
                    "total_slides_viewed ({}) exceeds the lesson's slide count ({})",
                    total, slide_count
                )));
            }
            next.total_slides_viewed = total;
        }

        if let Some(seconds) = update.time_spent_seconds {
            if seconds < self.time_spent_seconds {
                return Err(AppError::InvalidProgressRegression(
                    "time_spent_seconds".to_string(),
                ));
            }
            next.time_spent_seconds = seconds;
        }

        if let Some(index) = update.current_slide_index {
            next.current_slide_index = index;
        }

        next.touch(slide_count, now);
        Ok(next)
    }

    /// True when `self` is the first state of this row to be `Completed`.
    pub fn completes(&self, previous: &LessonProgress) -> bool {
        self.status == LessonStatus::Completed && previous.status != LessonStatus::Completed
    }

    fn touch(&mut self, slide_count: i32, now: DateTime<Utc>) {
        self.status = self.status.after_activity(self.total_slides_viewed, slide_count);
        self.started_at.get_or_insert(now);
        if self.status == LessonStatus::Completed {
            self.completed_at.get_or_insert(now);
        }
        self.updated_at = now;
    }
}

/// DTO for a slide-view beacon.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SlideViewRequest {
    #[validate(range(min = 0, message = "slide_index must not be negative"))]
    pub slide_index: i32,
    #[validate(range(min = 0, message = "seconds_spent must not be negative"))]
    pub seconds_spent: i64,
}

/// DTO for an explicit "mark progress" call. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProgressUpdate {
    #[validate(range(min = 0, message = "current_slide_index must not be negative"))]
    pub current_slide_index: Option<i32>,
    #[validate(range(min = 0, message = "total_slides_viewed must not be negative"))]
    pub total_slides_viewed: Option<i32>,
    #[validate(range(min = 0, message = "time_spent_seconds must not be negative"))]
    pub time_spent_seconds: Option<i64>,
}

impl ProgressUpdate {
    pub fn is_empty(&self) -> bool {
        self.current_slide_index.is_none()
            && self.total_slides_viewed.is_none()
            && self.time_spent_seconds.is_none()
    }
}
