// src/models/report.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::lesson_progress::LessonStatus;

/// Per-lesson line of a course progress report.
#[derive(Debug, Clone, Serialize)]
pub struct LessonProgressSummary {
    pub lesson_id: i64,
    pub title: String,
    pub position: i32,
    pub status: LessonStatus,
    pub current_slide_index: i32,
    pub total_slides_viewed: i32,
    pub slide_count: i32,
    pub time_spent_seconds: i64,
    pub completion_percentage: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Consolidated, read-only view of a student's progress through one course.
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgressReport {
    pub enrollment_id: i64,
    pub course_id: i64,
    pub total_lessons: i32,
    pub lessons_completed: i32,
    pub lessons_in_progress: i32,
    pub lessons_not_started: i32,
    pub total_time_spent_seconds: i64,

    /// Linear projection across lessons; does not look inside partially viewed lessons.
    /// `None` for a course without published lessons.
    pub estimated_time_remaining_seconds: Option<i64>,

    /// Copied from the enrollment, never recomputed here.
    pub overall_completion_percentage: i32,

    /// First lesson, in course order, that is not yet completed.
    pub resume_lesson_id: Option<i64>,

    pub lessons: Vec<LessonProgressSummary>,
}
