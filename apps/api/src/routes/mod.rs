pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/interviews/questions",
            post(handlers::handle_questions),
        )
        .route("/api/v1/interviews/reply", post(handlers::handle_reply))
        .route(
            "/api/v1/interviews/reply/stream",
            post(handlers::handle_reply_stream),
        )
        .route(
            "/api/v1/interviews/feedback",
            post(handlers::handle_feedback),
        )
        .with_state(state)
}
