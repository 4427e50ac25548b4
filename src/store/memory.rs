//! In-process `ProgressStore` with the same compare-and-swap contract as Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{ProgressStore, StoreResult};
use crate::{
    error::AppError,
    models::{
        catalog::{Course, Lesson},
        enrollment::{Enrollment, EnrollmentStatus},
        lesson_progress::{LessonProgress, LessonStatus},
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    courses: HashMap<i64, Course>,
    lessons: HashMap<i64, Lesson>,
    enrollments: HashMap<i64, Enrollment>,
    progress: HashMap<(i64, i64), LessonProgress>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a course to the catalog. The given `id` is replaced.
    pub async fn insert_course(&self, mut course: Course) -> Course {
        let mut tables = self.tables.lock().await;
        course.id = tables.next_id();
        tables.courses.insert(course.id, course.clone());
        course
    }

    /// Adds a lesson to the catalog. The given `id` is replaced.
    pub async fn insert_lesson(&self, mut lesson: Lesson) -> Lesson {
        let mut tables = self.tables.lock().await;
        lesson.id = tables.next_id();
        tables.lessons.insert(lesson.id, lesson.clone());
        lesson
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_course(&self, course_id: i64) -> StoreResult<Option<Course>> {
        Ok(self.tables.lock().await.courses.get(&course_id).cloned())
    }

    async fn find_lesson(&self, lesson_id: i64) -> StoreResult<Option<Lesson>> {
        Ok(self.tables.lock().await.lessons.get(&lesson_id).cloned())
    }

    async fn published_lessons(&self, course_id: i64) -> StoreResult<Vec<Lesson>> {
        let tables = self.tables.lock().await;
        let mut lessons: Vec<Lesson> = tables
            .lessons
            .values()
            .filter(|l| l.course_id == course_id && l.is_published)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.position, l.id));
        Ok(lessons)
    }

    async fn find_enrollment(&self, enrollment_id: i64) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .get(&enrollment_id)
            .cloned())
    }

    async fn find_enrollment_for(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .enrollments
            .values()
            .find(|e| e.student_id == student_id && e.course_id == course_id)
            .cloned())
    }

    async fn list_enrollments(&self, student_id: i64) -> StoreResult<Vec<Enrollment>> {
        let tables = self.tables.lock().await;
        let mut enrollments: Vec<Enrollment> = tables
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at).then(b.id.cmp(&a.id)));
        Ok(enrollments)
    }

    async fn insert_enrollment(
        &self,
        student_id: i64,
        course_id: i64,
        total_lessons: i32,
    ) -> StoreResult<Enrollment> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .enrollments
            .values()
            .any(|e| e.student_id == student_id && e.course_id == course_id);
        if taken {
            return Err(AppError::AlreadyEnrolled(course_id));
        }

        let enrollment = Enrollment {
            id: tables.next_id(),
            student_id,
            course_id,
            status: EnrollmentStatus::Active,
            lessons_completed: 0,
            total_lessons,
            progress_percentage: 0,
            enrolled_at: Utc::now(),
            last_accessed_at: None,
            completed_at: None,
            version: 0,
        };
        tables.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> StoreResult<Option<Enrollment>> {
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.enrollments.get_mut(&enrollment.id) else {
            return Ok(None);
        };
        if stored.version != enrollment.version {
            return Ok(None);
        }
        *stored = Enrollment {
            version: enrollment.version + 1,
            ..enrollment.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn find_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<Option<LessonProgress>> {
        let tables = self.tables.lock().await;
        Ok(tables.progress.get(&(enrollment_id, lesson_id)).cloned())
    }

    async fn get_or_insert_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<LessonProgress> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.progress.get(&(enrollment_id, lesson_id)) {
            return Ok(existing.clone());
        }
        let row = LessonProgress::not_started(tables.next_id(), enrollment_id, lesson_id, Utc::now());
        tables
            .progress
            .insert((enrollment_id, lesson_id), row.clone());
        Ok(row)
    }

    async fn update_lesson_progress(
        &self,
        progress: &LessonProgress,
    ) -> StoreResult<Option<LessonProgress>> {
        let mut tables = self.tables.lock().await;
        let key = (progress.enrollment_id, progress.lesson_id);
        let Some(stored) = tables.progress.get_mut(&key) else {
            return Ok(None);
        };
        if stored.version != progress.version {
            return Ok(None);
        }
        *stored = LessonProgress {
            version: progress.version + 1,
            ..progress.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn list_lesson_progress(&self, enrollment_id: i64) -> StoreResult<Vec<LessonProgress>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<LessonProgress> = tables
            .progress
            .values()
            .filter(|p| p.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.lesson_id);
        Ok(rows)
    }

    async fn count_completed_lessons(&self, enrollment_id: i64) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        let count = tables
            .progress
            .values()
            .filter(|p| p.enrollment_id == enrollment_id && p.status == LessonStatus::Completed)
            .count();
        Ok(count as i64)
    }
}
