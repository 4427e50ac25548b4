use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{CourseProgressView, EnrollmentAggregator, LessonProgressTracker},
    store::ProgressStore,
};

#[derive(Clone)]
pub struct AppState {
    pub tracker: LessonProgressTracker,
    pub aggregator: EnrollmentAggregator,
    pub view: CourseProgressView,
    pub config: Config,
}

impl AppState {
    /// Wires the three progress components over one shared store.
    pub fn new(store: Arc<dyn ProgressStore>, config: Config) -> Self {
        let aggregator = EnrollmentAggregator::new(store.clone(), config.max_write_retries);
        let tracker =
            LessonProgressTracker::new(store.clone(), aggregator.clone(), config.max_write_retries);
        let view = CourseProgressView::new(store);

        Self {
            tracker,
            aggregator,
            view,
            config,
        }
    }
}

impl FromRef<AppState> for LessonProgressTracker {
    fn from_ref(state: &AppState) -> Self {
        state.tracker.clone()
    }
}

impl FromRef<AppState> for EnrollmentAggregator {
    fn from_ref(state: &AppState) -> Self {
        state.aggregator.clone()
    }
}

impl FromRef<AppState> for CourseProgressView {
    fn from_ref(state: &AppState) -> Self {
        state.view.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
