//! API handlers.
//!
//! Every handler goes through the zone's actor handle; nothing here touches
//! engine state directly.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{ZoneHandle, ZoneRegistry};
use crate::types::{InsulationRating, Season, Sourced};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: ZoneRegistry,
    pub started_at: DateTime<Utc>,
    pub storage_backend: &'static str,
}

impl ApiState {
    pub fn new(registry: ZoneRegistry, storage_backend: &'static str) -> Self {
        Self {
            registry,
            started_at: Utc::now(),
            storage_backend,
        }
    }

    fn zone(&self, id: &str) -> Result<&ZoneHandle, Response> {
        self.registry
            .get(id)
            .ok_or_else(|| ApiErrorResponse::unknown_zone(id))
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub zones: usize,
    pub storage_backend: &'static str,
    pub uptime_secs: i64,
}

/// One row of the zone list.
#[derive(Debug, Serialize)]
pub struct ZoneSummary {
    pub zone_id: String,
    pub zone_name: String,
    pub ready: bool,
    pub analysis_progress: f64,
    pub season: Season,
    pub insulation_rating: InsulationRating,
    pub k: Option<Sourced<f64>>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub zone_id: String,
    /// `false` when there was nothing to clear
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    /// Most recent N days only
    pub limit: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn health(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        zones: state.registry.len(),
        storage_backend: state.storage_backend,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/v1/zones
pub async fn list_zones(State(state): State<ApiState>) -> Response {
    let mut zones = Vec::with_capacity(state.registry.len());
    for handle in state.registry.handles() {
        match handle.outputs().await {
            Ok(out) => zones.push(ZoneSummary {
                zone_id: out.zone_id,
                zone_name: out.zone_name,
                ready: out.ready,
                analysis_progress: out.analysis_progress,
                season: out.season,
                insulation_rating: out.insulation_rating,
                k: out.k,
            }),
            Err(e) => {
                warn!(zone = %handle.zone_id(), error = %e, "Zone did not answer");
                return ApiErrorResponse::zone_unavailable(handle.zone_id(), e);
            }
        }
    }
    ApiResponse::ok(zones)
}

/// GET /api/v1/zones/:id
pub async fn get_zone(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let handle = match state.zone(&id) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match handle.outputs().await {
        Ok(out) => ApiResponse::ok(out),
        Err(e) => ApiErrorResponse::zone_unavailable(&id, e),
    }
}

/// GET /api/v1/zones/:id/history
pub async fn get_history(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let handle = match state.zone(&id) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match handle.history().await {
        Ok(history) => ApiResponse::ok(history),
        Err(e) => ApiErrorResponse::zone_unavailable(&id, e),
    }
}

/// GET /api/v1/zones/:id/archive?limit=N
pub async fn get_archive(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<ArchiveQuery>,
) -> Response {
    if query.limit == Some(0) {
        return ApiErrorResponse::invalid_query("limit must be at least 1");
    }
    let handle = match state.zone(&id) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match handle.archive().await {
        Ok(mut archive) => {
            if let Some(limit) = query.limit {
                let skip = archive.len().saturating_sub(limit);
                archive.drain(..skip);
            }
            ApiResponse::ok(archive)
        }
        Err(e) => ApiErrorResponse::zone_unavailable(&id, e),
    }
}

/// POST /api/v1/zones/:id/reset_history
pub async fn reset_history(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let handle = match state.zone(&id) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match handle.reset_history().await {
        Ok(changed) => {
            info!(zone = %id, changed, "reset_history requested via API");
            ApiResponse::ok(ResetResponse { zone_id: id, changed })
        }
        Err(e) => ApiErrorResponse::zone_unavailable(&id, e),
    }
}

/// POST /api/v1/zones/:id/reset_all
pub async fn reset_all(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let handle = match state.zone(&id) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match handle.reset_all().await {
        Ok(()) => {
            info!(zone = %id, "reset_all requested via API");
            ApiResponse::ok(ResetResponse {
                zone_id: id,
                changed: true,
            })
        }
        Err(e) => ApiErrorResponse::zone_unavailable(&id, e),
    }
}
