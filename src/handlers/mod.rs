// src/handlers/mod.rs

pub mod enrollment;
pub mod health;
pub mod progress;
