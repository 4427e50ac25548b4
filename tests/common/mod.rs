// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use course_progress::{
    config::Config,
    models::catalog::{Course, Lesson},
    state::AppState,
    store::{MemoryStore, ProgressStore},
};

pub const TEST_SECRET: &str = "test_secret_for_integration_tests";

/// Build a test `Config`. The database URL is never dialed by the memory store.
pub fn test_config(max_write_retries: u32) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        db_max_connections: 1,
        max_write_retries,
    }
}

/// Wires the services over a fresh in-memory store.
pub fn memory_state(max_write_retries: u32) -> (Arc<MemoryStore>, AppState) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone() as Arc<dyn ProgressStore>,
        test_config(max_write_retries),
    );
    (store, state)
}

/// Seeds a course whose lessons have the given (slide_count, estimated_minutes).
pub async fn seed_course(
    store: &MemoryStore,
    published: bool,
    lessons: &[(i32, Option<i32>)],
) -> (Course, Vec<Lesson>) {
    let course = store
        .insert_course(Course {
            id: 0,
            title: "Structural Mechanics 101".to_string(),
            is_published: published,
        })
        .await;

    let mut seeded = Vec::new();
    for (position, (slide_count, estimated_minutes)) in lessons.iter().enumerate() {
        let lesson = store
            .insert_lesson(Lesson {
                id: 0,
                course_id: course.id,
                title: format!("Lesson {}", position + 1),
                position: position as i32,
                slide_count: *slide_count,
                estimated_minutes: *estimated_minutes,
                is_published: true,
            })
            .await;
        seeded.push(lesson);
    }
    (course, seeded)
}
