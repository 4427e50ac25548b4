// src/models/catalog.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'courses' table. Owned by the content service, read-only here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub is_published: bool,
}

/// Represents the 'lessons' table. Owned by the content service, read-only here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,

    /// Ordering of the lesson inside its course.
    pub position: i32,

    /// Number of slides; the denominator for lesson completion.
    pub slide_count: i32,

    /// Author's estimate used for the remaining-time projection.
    pub estimated_minutes: Option<i32>,

    pub is_published: bool,
}
