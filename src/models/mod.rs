// src/models/mod.rs

pub mod catalog;
pub mod enrollment;
pub mod lesson_progress;
pub mod report;
