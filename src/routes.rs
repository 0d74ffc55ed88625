// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exams, explainer, health, history, sessions, stats},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges the sub-routers (exams, history, sessions, ai).
/// * Applies global middleware (Trace, CORS).
/// * Injects the shared `AppState`.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let exam_routes = Router::new()
        .route("/", get(exams::list_exams).post(exams::create_exam))
        .route("/{id}", get(exams::get_exam))
        .route("/{id}/questions", post(exams::add_question));

    let history_routes = Router::new()
        .route("/save-history", post(history::save_history))
        .route("/stats", get(stats::stats_by_query))
        .route("/user/{user_id}", get(history::list_user_history))
        .route("/user/{user_id}/stats", get(stats::user_stats))
        .route("/{id}", get(history::get_history));

    let session_routes = Router::new()
        .route("/", post(sessions::start_session))
        .route("/{id}", get(sessions::get_session).delete(sessions::discard))
        .route("/{id}/answer", post(sessions::answer))
        .route("/{id}/advance", post(sessions::advance))
        .route("/{id}/retreat", post(sessions::retreat))
        .route("/{id}/finalize", post(sessions::finalize))
        .route("/{id}/hint", post(sessions::hint));

    let ai_routes = Router::new()
        .route("/ask", post(explainer::ask))
        .route("/status", get(explainer::status));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/exams", exam_routes)
        .nest("/api/history", history_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/ai", ai_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
