// tests/progress_tests.rs

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use course_progress::{
    error::AppError,
    models::{
        catalog::{Course, Lesson},
        enrollment::{Enrollment, EnrollmentStatus},
        lesson_progress::{LessonProgress, LessonStatus, ProgressUpdate},
    },
    services::{EnrollmentAggregator, LessonProgressTracker},
    store::{MemoryStore, ProgressStore, StoreResult},
};

use common::{memory_state, seed_course};

const STUDENT: i64 = 1001;
const OTHER_STUDENT: i64 = 2002;

/// Views every slide of `lesson` in order, 10 seconds each.
async fn view_all(tracker: &LessonProgressTracker, enrollment_id: i64, lesson: &Lesson) -> LessonProgress {
    let mut last = None;
    for slide in 0..lesson.slide_count {
        last = Some(
            tracker
                .record_slide_view(STUDENT, enrollment_id, lesson.id, slide, 10)
                .await
                .unwrap(),
        );
    }
    last.expect("lesson has slides")
}

#[tokio::test]
async fn out_of_order_viewing_completes_lesson() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(3, Some(10)), (2, Some(5))]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    let lesson = &lessons[0];

    for (slide, seconds) in [(2, 30), (0, 20), (1, 25)] {
        state
            .tracker
            .record_slide_view(STUDENT, enrollment.id, lesson.id, slide, seconds)
            .await
            .unwrap();
    }

    let progress = state
        .tracker
        .get_or_create(STUDENT, enrollment.id, lesson.id)
        .await
        .unwrap();
    assert_eq!(progress.total_slides_viewed, 3);
    assert_eq!(progress.time_spent_seconds, 75);
    assert_eq!(progress.status, LessonStatus::Completed);
    assert_eq!(progress.current_slide_index, 1);
}

#[tokio::test]
async fn lesson_completion_cascades_into_enrollment() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(2, Some(10)), (3, Some(20))]).await;
    let (enrollment, created) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    assert!(created);
    assert_eq!(enrollment.total_lessons, 2);

    // Partial progress never touches the enrollment.
    state
        .tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 10)
        .await
        .unwrap();
    let untouched = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(untouched.lessons_completed, 0);
    assert!(untouched.last_accessed_at.is_none());

    view_all(&state.tracker, enrollment.id, &lessons[0]).await;
    let half = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(half.lessons_completed, 1);
    assert_eq!(half.progress_percentage, 50);
    assert_eq!(half.status, EnrollmentStatus::Active);
    assert!(half.completed_at.is_none());

    view_all(&state.tracker, enrollment.id, &lessons[1]).await;
    let done = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(done.lessons_completed, 2);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.status, EnrollmentStatus::Completed);
    assert!(done.completed_at.is_some());

    let report = state
        .view
        .get_course_progress(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(report.overall_completion_percentage, done.progress_percentage);
    assert_eq!(report.lessons_completed, 2);
    assert_eq!(report.estimated_time_remaining_seconds, Some(0));
    assert_eq!(report.resume_lesson_id, None);
}

#[tokio::test]
async fn completed_lesson_ignores_further_views() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(2, None), (2, None)]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();

    let done = view_all(&state.tracker, enrollment.id, &lessons[0]).await;
    let after = state
        .tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 15)
        .await
        .unwrap();

    assert_eq!(after.status, LessonStatus::Completed);
    assert_eq!(after.total_slides_viewed, done.total_slides_viewed);
    assert_eq!(after.time_spent_seconds, done.time_spent_seconds + 15);
    assert_eq!(after.completed_at, done.completed_at);

    let enrollment = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(enrollment.lessons_completed, 1);
}

#[tokio::test]
async fn reactivation_keeps_counters() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(1, None), (1, None)]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    view_all(&state.tracker, enrollment.id, &lessons[0]).await;

    state
        .aggregator
        .unenroll(STUDENT, enrollment.id)
        .await
        .unwrap();
    // Dropping twice is a no-op.
    state
        .aggregator
        .unenroll(STUDENT, enrollment.id)
        .await
        .unwrap();

    let dropped = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(dropped.status, EnrollmentStatus::Dropped);

    let (back, created) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    assert!(!created);
    assert_eq!(back.id, enrollment.id);
    assert_eq!(back.status, EnrollmentStatus::Active);
    assert_eq!(back.lessons_completed, 1);
    assert_eq!(back.progress_percentage, 50);
    assert_eq!(back.total_lessons, 2);
}

#[tokio::test]
async fn zero_lesson_course_never_divides_by_zero() {
    let (store, state) = memory_state(5);
    let (course, _) = seed_course(&store, true, &[]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    assert_eq!(enrollment.total_lessons, 0);
    assert_eq!(enrollment.progress_percentage, 0);

    let recomputed = state
        .aggregator
        .recompute_on_lesson_completed(enrollment.id)
        .await
        .unwrap();
    assert_eq!(recomputed.progress_percentage, 0);
    assert_eq!(recomputed.status, EnrollmentStatus::Active);

    let report = state
        .view
        .get_course_progress(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(report.total_lessons, 0);
    assert_eq!(report.estimated_time_remaining_seconds, None);
    assert_eq!(report.overall_completion_percentage, 0);
}

#[tokio::test]
async fn report_joins_missing_rows_as_not_started() {
    let (store, state) = memory_state(5);
    let (course, lessons) =
        seed_course(&store, true, &[(4, Some(10)), (4, Some(10)), (4, Some(10))]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();

    view_all(&state.tracker, enrollment.id, &lessons[0]).await;
    state
        .tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[1].id, 1, 12)
        .await
        .unwrap();

    let report = state
        .view
        .get_course_progress(STUDENT, enrollment.id)
        .await
        .unwrap();
    let enrollment = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();

    assert_eq!(report.lessons_completed, 1);
    assert_eq!(report.lessons_in_progress, 1);
    assert_eq!(report.lessons_not_started, 1);
    assert_eq!(report.total_time_spent_seconds, 52);
    assert_eq!(report.estimated_time_remaining_seconds, Some(1200));
    assert_eq!(report.overall_completion_percentage, 33);
    assert_eq!(report.overall_completion_percentage, enrollment.progress_percentage);
    assert_eq!(report.resume_lesson_id, Some(lessons[1].id));
    assert_eq!(report.lessons[1].completion_percentage, 50);
    assert_eq!(report.lessons[2].status, LessonStatus::NotStarted);
}

#[tokio::test]
async fn access_rules() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(2, None)]).await;
    let (other_course, other_lessons) = seed_course(&store, true, &[(2, None)]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    state
        .aggregator
        .enroll(STUDENT, other_course.id)
        .await
        .unwrap();

    // Someone else's enrollment.
    assert!(matches!(
        state
            .tracker
            .get_or_create(OTHER_STUDENT, enrollment.id, lessons[0].id)
            .await,
        Err(AppError::NotEnrolled(_))
    ));
    assert!(matches!(
        state.view.get_course_progress(OTHER_STUDENT, enrollment.id).await,
        Err(AppError::NotEnrolled(_))
    ));

    // A lesson from a different course.
    assert!(matches!(
        state
            .tracker
            .record_slide_view(STUDENT, enrollment.id, other_lessons[0].id, 0, 1)
            .await,
        Err(AppError::NotEnrolled(_))
    ));

    assert_eq!(
        state
            .tracker
            .get_or_create(STUDENT, enrollment.id, 999_999)
            .await,
        Err(AppError::LessonNotFound(999_999))
    );
    assert!(matches!(
        state.tracker.get_or_create(STUDENT, 999_999, lessons[0].id).await,
        Err(AppError::NotFound(_))
    ));

    // Lazily created on first query.
    let fresh = state
        .tracker
        .get_or_create(STUDENT, enrollment.id, lessons[0].id)
        .await
        .unwrap();
    assert_eq!(fresh.status, LessonStatus::NotStarted);
    assert_eq!(fresh.total_slides_viewed, 0);

    state
        .aggregator
        .unenroll(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert!(matches!(
        state
            .tracker
            .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 1)
            .await,
        Err(AppError::NotEnrolled(_))
    ));
}

#[tokio::test]
async fn negative_inputs_are_rejected() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(2, None)]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();

    assert!(matches!(
        state
            .tracker
            .record_slide_view(STUDENT, enrollment.id, lessons[0].id, -1, 5)
            .await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        state
            .tracker
            .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, -5)
            .await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn set_progress_rejects_regression_and_cascades() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(4, None)]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    let lesson = &lessons[0];

    state
        .tracker
        .record_slide_view(STUDENT, enrollment.id, lesson.id, 2, 40)
        .await
        .unwrap();

    let regress = ProgressUpdate {
        total_slides_viewed: Some(1),
        ..Default::default()
    };
    assert_eq!(
        state
            .tracker
            .set_progress(STUDENT, enrollment.id, lesson.id, &regress)
            .await,
        Err(AppError::InvalidProgressRegression(
            "total_slides_viewed".to_string()
        ))
    );

    let unchanged = state
        .tracker
        .set_progress(STUDENT, enrollment.id, lesson.id, &ProgressUpdate::default())
        .await
        .unwrap();
    assert_eq!(unchanged.total_slides_viewed, 3);

    let finish = ProgressUpdate {
        total_slides_viewed: Some(4),
        time_spent_seconds: Some(90),
        current_slide_index: Some(3),
    };
    let done = state
        .tracker
        .set_progress(STUDENT, enrollment.id, lesson.id, &finish)
        .await
        .unwrap();
    assert_eq!(done.status, LessonStatus::Completed);

    let enrollment = state
        .aggregator
        .get_enrollment(STUDENT, enrollment.id)
        .await
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Completed);
    assert_eq!(enrollment.progress_percentage, 100);
}

#[tokio::test]
async fn enroll_preconditions() {
    let (store, state) = memory_state(5);
    let (draft, _) = seed_course(&store, false, &[(1, None)]).await;
    let (course, _) = seed_course(&store, true, &[(1, None)]).await;

    assert_eq!(
        state.aggregator.enroll(STUDENT, draft.id).await,
        Err(AppError::CourseNotPublished(draft.id))
    );
    assert!(matches!(
        state.aggregator.enroll(STUDENT, 999_999).await,
        Err(AppError::NotFound(_))
    ));

    state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    assert_eq!(
        state.aggregator.enroll(STUDENT, course.id).await,
        Err(AppError::AlreadyEnrolled(course.id))
    );

    let mine = state.aggregator.list_enrollments(STUDENT).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(
        state
            .aggregator
            .list_enrollments(OTHER_STUDENT)
            .await
            .unwrap()
            .is_empty()
    );
}

/// Delegates to a memory store but loses every lesson-progress version check.
/// Memory store whose version-checked writes can be made to always lose.
struct ContendedStore {
    inner: MemoryStore,
    lose_lesson_writes: AtomicBool,
    lose_enrollment_writes: AtomicBool,
}

impl ContendedStore {
    fn new(lose_lesson_writes: bool, lose_enrollment_writes: bool) -> Self {
        Self {
            inner: MemoryStore::new(),
            lose_lesson_writes: AtomicBool::new(lose_lesson_writes),
            lose_enrollment_writes: AtomicBool::new(lose_enrollment_writes),
        }
    }
}

#[async_trait]
impl ProgressStore for ContendedStore {
    async fn find_course(&self, course_id: i64) -> StoreResult<Option<Course>> {
        self.inner.find_course(course_id).await
    }

    async fn find_lesson(&self, lesson_id: i64) -> StoreResult<Option<Lesson>> {
        self.inner.find_lesson(lesson_id).await
    }

    async fn published_lessons(&self, course_id: i64) -> StoreResult<Vec<Lesson>> {
        self.inner.published_lessons(course_id).await
    }

    async fn find_enrollment(&self, enrollment_id: i64) -> StoreResult<Option<Enrollment>> {
        self.inner.find_enrollment(enrollment_id).await
    }

    async fn find_enrollment_for(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        self.inner.find_enrollment_for(student_id, course_id).await
    }

    async fn list_enrollments(&self, student_id: i64) -> StoreResult<Vec<Enrollment>> {
        self.inner.list_enrollments(student_id).await
    }

    async fn insert_enrollment(
        &self,
        student_id: i64,
        course_id: i64,
        total_lessons: i32,
    ) -> StoreResult<Enrollment> {
        self.inner
            .insert_enrollment(student_id, course_id, total_lessons)
            .await
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> StoreResult<Option<Enrollment>> {
        if self.lose_enrollment_writes.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.update_enrollment(enrollment).await
    }

    async fn find_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<Option<LessonProgress>> {
        self.inner.find_lesson_progress(enrollment_id, lesson_id).await
    }

    async fn get_or_insert_lesson_progress(
        &self,
        enrollment_id: i64,
        lesson_id: i64,
    ) -> StoreResult<LessonProgress> {
        self.inner
            .get_or_insert_lesson_progress(enrollment_id, lesson_id)
            .await
    }

    async fn update_lesson_progress(
        &self,
        progress: &LessonProgress,
    ) -> StoreResult<Option<LessonProgress>> {
        if self.lose_lesson_writes.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.update_lesson_progress(progress).await
    }

    async fn list_lesson_progress(&self, enrollment_id: i64) -> StoreResult<Vec<LessonProgress>> {
        self.inner.list_lesson_progress(enrollment_id).await
    }

    async fn count_completed_lessons(&self, enrollment_id: i64) -> StoreResult<i64> {
        self.inner.count_completed_lessons(enrollment_id).await
    }
}

#[tokio::test]
async fn exhausted_retries_surface_conflict() {
    let contended = Arc::new(ContendedStore::new(true, false));
    let (course, lessons) = seed_course(&contended.inner, true, &[(3, None)]).await;

    let store = contended.clone() as Arc<dyn ProgressStore>;
    let aggregator = EnrollmentAggregator::new(store.clone(), 3);
    let tracker = LessonProgressTracker::new(store, aggregator.clone(), 3);

    let (enrollment, _) = aggregator.enroll(STUDENT, course.id).await.unwrap();
    let result = tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 5)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Nothing was written.
    let row = contended
        .inner
        .find_lesson_progress(enrollment.id, lessons[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.total_slides_viewed, 0);
    assert_eq!(row.time_spent_seconds, 0);
}

#[tokio::test]
async fn failed_cascade_is_reconciled_without_double_counting() {
    let contended = Arc::new(ContendedStore::new(false, true));
    let (course, lessons) = seed_course(&contended.inner, true, &[(1, None)]).await;

    let store = contended.clone() as Arc<dyn ProgressStore>;
    let aggregator = EnrollmentAggregator::new(store.clone(), 3);
    let tracker = LessonProgressTracker::new(store, aggregator.clone(), 3);
    let (enrollment, _) = aggregator.enroll(STUDENT, course.id).await.unwrap();

    // The lesson row commits even though every enrollment write loses.
    let row = tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 5)
        .await
        .unwrap();
    assert_eq!(row.status, LessonStatus::Completed);
    assert_eq!(row.time_spent_seconds, 5);

    let stale = aggregator.get_enrollment(STUDENT, enrollment.id).await.unwrap();
    assert_eq!(stale.lessons_completed, 0);
    assert_eq!(stale.status, EnrollmentStatus::Active);

    // The next write on the completed lesson repairs the counters.
    contended.lose_enrollment_writes.store(false, Ordering::SeqCst);
    let row = tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 0)
        .await
        .unwrap();
    assert_eq!(row.time_spent_seconds, 5);

    let repaired = aggregator.get_enrollment(STUDENT, enrollment.id).await.unwrap();
    assert_eq!(repaired.lessons_completed, 1);
    assert_eq!(repaired.progress_percentage, 100);
    assert_eq!(repaired.status, EnrollmentStatus::Completed);
    assert!(repaired.completed_at.is_some());

    // Already consistent: nothing further is written.
    let version = repaired.version;
    tracker
        .record_slide_view(STUDENT, enrollment.id, lessons[0].id, 0, 1)
        .await
        .unwrap();
    let unchanged = aggregator.get_enrollment(STUDENT, enrollment.id).await.unwrap();
    assert_eq!(unchanged.version, version);
}

#[tokio::test]
async fn drop_racing_final_completion_stays_dropped() {
    let (store, state) = memory_state(5);
    let (course, lessons) = seed_course(&store, true, &[(1, None)]).await;
    let (enrollment, _) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();

    // Row completed, then the drop commits before the recount runs.
    state
        .aggregator
        .unenroll(STUDENT, enrollment.id)
        .await
        .unwrap();
    let row = store
        .get_or_insert_lesson_progress(enrollment.id, lessons[0].id)
        .await
        .unwrap();
    let completed = row.apply_slide_view(0, 5, 1, chrono::Utc::now());
    store.update_lesson_progress(&completed).await.unwrap().unwrap();

    let recounted = state
        .aggregator
        .recompute_on_lesson_completed(enrollment.id)
        .await
        .unwrap();
    assert_eq!(recounted.status, EnrollmentStatus::Dropped);
    assert_eq!(recounted.lessons_completed, 1);
    assert_eq!(recounted.progress_percentage, 100);

    let (back, created) = state.aggregator.enroll(STUDENT, course.id).await.unwrap();
    assert!(!created);
    assert_eq!(back.status, EnrollmentStatus::Completed);
}
