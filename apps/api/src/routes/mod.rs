pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Catalogue
        .route("/api/v1/questions", get(handlers::handle_list_questions))
        .route("/api/v1/models", get(handlers::handle_list_models))
        // Interview sessions
        .route("/api/v1/interviews", post(handlers::handle_start))
        .route(
            "/api/v1/interviews/:id",
            get(handlers::handle_get_session).delete(handlers::handle_discard),
        )
        .route(
            "/api/v1/interviews/:id/settings",
            patch(handlers::handle_update_settings),
        )
        .route(
            "/api/v1/interviews/:id/answers",
            post(handlers::handle_submit_answer),
        )
        .route("/api/v1/interviews/:id/skip", post(handlers::handle_skip))
        .route("/api/v1/interviews/:id/report", get(handlers::handle_report))
        // Archived transcripts
        .route(
            "/api/v1/transcripts",
            get(handlers::handle_list_transcripts),
        )
        .route(
            "/api/v1/transcripts/:session_id",
            get(handlers::handle_get_transcript),
        )
        .with_state(state)
}
