//! REST API module using Axum
//!
//! Read access to zone outputs and the two zone commands:
//! - `GET  /api/v1/health`
//! - `GET  /api/v1/zones`, `/api/v1/zones/:id`
//! - `GET  /api/v1/zones/:id/history`, `/api/v1/zones/:id/archive`
//! - `POST /api/v1/zones/:id/reset_history`, `/api/v1/zones/:id/reset_all`

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable with a comma-separated list of allowed CORS origins.
pub const CORS_ENV_VAR: &str = "THERMAL_CORS_ORIGINS";

/// Same-origin only unless `THERMAL_CORS_ORIGINS` is set.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var(CORS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
