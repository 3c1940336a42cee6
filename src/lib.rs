pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod prompt;
pub mod routes;
pub mod rubric;
pub mod score;
pub mod scorecard;
pub mod state;
pub mod templates;
pub mod workflow;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn app(state: Arc<state::AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(routes::index))
        .route("/session/:session_id", get(routes::view_session))
        .route(
            "/session/:session_id/process",
            post(routes::process_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/session/:session_id/scorecard", post(routes::scorecard_handler))
        .route("/session/:session_id/save", post(routes::save_handler))
        .route("/session/:session_id/reset", post(routes::reset_handler))
        .route("/submissions.csv", get(routes::download_csv))
        .route("/api/submissions", get(routes::list_submissions))
        .route("/api/submissions/:id", get(routes::get_submission))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
