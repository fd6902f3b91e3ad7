//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

/// Build the `/api/v1` router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/zones", get(handlers::list_zones))
        .route("/zones/:id", get(handlers::get_zone))
        .route("/zones/:id/history", get(handlers::get_history))
        .route("/zones/:id/archive", get(handlers::get_archive))
        // Commands
        .route("/zones/:id/reset_history", post(handlers::reset_history))
        .route("/zones/:id/reset_all", post(handlers::reset_all))
        .with_state(state)
}
