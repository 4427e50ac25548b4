// src/services/view.rs

use std::{collections::HashMap, sync::Arc};

use super::load_owned_enrollment;
use crate::{
    error::AppError,
    models::{
        catalog::Lesson,
        enrollment::Enrollment,
        lesson_progress::{LessonProgress, LessonStatus},
        report::{CourseProgressReport, LessonProgressSummary},
    },
    store::ProgressStore,
    utils::percent::round_percentage,
};

/// Read-only course progress reporting. Never writes.
#[derive(Clone)]
pub struct CourseProgressView {
    store: Arc<dyn ProgressStore>,
}

impl CourseProgressView {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    pub async fn get_course_progress(
        &self,
        student_id: i64,
        enrollment_id: i64,
    ) -> Result<CourseProgressReport, AppError> {
        let enrollment =
            load_owned_enrollment(self.store.as_ref(), student_id, enrollment_id).await?;
        let lessons = self.store.published_lessons(enrollment.course_id).await?;
        let rows = self.store.list_lesson_progress(enrollment_id).await?;

        Ok(build_report(&enrollment, &lessons, &rows))
    }
}

/// Joins published lessons (already in course order) with the enrollment's progress rows.
fn build_report(
    enrollment: &Enrollment,
    lessons: &[Lesson],
    rows: &[LessonProgress],
) -> CourseProgressReport {
    let by_lesson: HashMap<i64, &LessonProgress> = rows.iter().map(|p| (p.lesson_id, p)).collect();

    let mut completed = 0;
    let mut in_progress = 0;
    let mut not_started = 0;
    let mut estimated_minutes: i64 = 0;
    let mut resume_lesson_id = None;

    let summaries: Vec<LessonProgressSummary> = lessons
        .iter()
        .map(|lesson| {
            let row = by_lesson.get(&lesson.id);
            let status = row.map_or(LessonStatus::NotStarted, |p| p.status);
            match status {
                LessonStatus::Completed => completed += 1,
                LessonStatus::InProgress => in_progress += 1,
                LessonStatus::NotStarted => not_started += 1,
            }
            if status != LessonStatus::Completed && resume_lesson_id.is_none() {
                resume_lesson_id = Some(lesson.id);
            }
            estimated_minutes += i64::from(lesson.estimated_minutes.unwrap_or(0));

            let total_slides_viewed = row.map_or(0, |p| p.total_slides_viewed);
            LessonProgressSummary {
                lesson_id: lesson.id,
                title: lesson.title.clone(),
                position: lesson.position,
                status,
                current_slide_index: row.map_or(0, |p| p.current_slide_index),
                total_slides_viewed,
                slide_count: lesson.slide_count,
                time_spent_seconds: row.map_or(0, |p| p.time_spent_seconds),
                completion_percentage: round_percentage(
                    i64::from(total_slides_viewed),
                    i64::from(lesson.slide_count),
                ),
                started_at: row.and_then(|p| p.started_at),
                completed_at: row.and_then(|p| p.completed_at),
            }
        })
        .collect();

    let total_lessons = summaries.len() as i64;
    let estimated_time_remaining_seconds = (total_lessons > 0).then(|| {
        estimated_minutes * 60 * (total_lessons - i64::from(completed)) / total_lessons
    });

    CourseProgressReport {
        enrollment_id: enrollment.id,
        course_id: enrollment.course_id,
        total_lessons: total_lessons as i32,
        lessons_completed: completed,
        lessons_in_progress: in_progress,
        lessons_not_started: not_started,
        total_time_spent_seconds: rows.iter().map(|p| p.time_spent_seconds).sum(),
        estimated_time_remaining_seconds,
        overall_completion_percentage: enrollment.progress_percentage,
        resume_lesson_id,
        lessons: summaries,
    }
}
