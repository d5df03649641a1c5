//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

/// Build the `/api/v1` router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/snapshot", get(handlers::snapshot))
        // Phase commands
        .route("/learning/start", post(handlers::start_learning))
        .route("/learning/end", post(handlers::end_learning))
        .route("/analysis/start", post(handlers::start_analysis))
        // Session log
        .route("/log", get(handlers::get_log).delete(handlers::clear_log))
        .with_state(state)
}
