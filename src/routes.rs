// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{enrollment, health, progress},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (health, enrollments, lesson progress).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (progress services and config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let enrollment_routes = Router::new()
        .route(
            "/",
            get(enrollment::list_enrollments).post(enrollment::enroll),
        )
        .route(
            "/{id}",
            get(enrollment::get_enrollment).delete(enrollment::unenroll),
        )
        .route("/{id}/progress", get(enrollment::get_course_progress))
        .route(
            "/{id}/lessons/{lesson_id}/progress",
            get(progress::get_lesson_progress).patch(progress::set_progress),
        )
        .route(
            "/{id}/lessons/{lesson_id}/views",
            post(progress::record_slide_view),
        )
        // Every enrollment route acts on behalf of the authenticated student
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/enrollments", enrollment_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
