//! Response envelope shared by every API endpoint.
//!
//! Success bodies are `{ "data": T, "meta": {...} }`. Errors are
//! `{ "error": { "code", "message", "zone_id"? }, "meta": {...} }` where
//! `code` is one of [`ErrorCode`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// API version reported in every response.
pub const API_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub generated_at: DateTime<Utc>,
    pub version: &'static str,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            generated_at: Utc::now(),
            version: API_VERSION,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::now(),
        };
        (StatusCode::OK, axum::Json(body)).into_response()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No zone with this id is configured
    UnknownZone,
    /// The zone's actor stopped or did not answer
    ZoneUnavailable,
    /// Query parameters out of range
    InvalidQuery,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::UnknownZone => StatusCode::NOT_FOUND,
            ErrorCode::ZoneUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InvalidQuery => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(code: ErrorCode, message: String, zone_id: Option<&str>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code,
                message,
                zone_id: zone_id.map(str::to_string),
            },
            meta: ResponseMeta::now(),
        };
        (code.status(), axum::Json(body)).into_response()
    }

    pub fn unknown_zone(zone_id: &str) -> Response {
        Self::build(
            ErrorCode::UnknownZone,
            format!("Unknown zone '{zone_id}'"),
            Some(zone_id),
        )
    }

    /// The zone exists but its actor could not serve the request.
    pub fn zone_unavailable(zone_id: &str, reason: impl std::fmt::Display) -> Response {
        Self::build(
            ErrorCode::ZoneUnavailable,
            format!("Zone '{zone_id}' is not running: {reason}"),
            Some(zone_id),
        )
    }

    pub fn invalid_query(msg: impl Into<String>) -> Response {
        Self::build(ErrorCode::InvalidQuery, msg.into(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ok_response_shape() {
        let resp = ApiResponse::ok(serde_json::json!({"zone": "office"}));
        assert_eq!(resp.status(), StatusCode::OK);

        let v = body_json(resp).await;
        assert_eq!(v["data"]["zone"], "office");
        assert_eq!(v["meta"]["version"], API_VERSION);
        assert!(v["meta"]["generated_at"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_zone_names_the_zone() {
        let resp = ApiErrorResponse::unknown_zone("attic");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], "UNKNOWN_ZONE");
        assert_eq!(v["error"]["zone_id"], "attic");
        assert_eq!(v["error"]["message"], "Unknown zone 'attic'");
    }

    #[tokio::test]
    async fn test_query_error_has_no_zone() {
        let resp = ApiErrorResponse::invalid_query("limit must be at least 1");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let v = body_json(resp).await;
        assert_eq!(v["error"]["code"], "INVALID_QUERY");
        assert!(v["error"].get("zone_id").is_none());
    }

    #[tokio::test]
    async fn test_unavailable_zone_is_503() {
        let resp = ApiErrorResponse::zone_unavailable("office", "channel closed");
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(resp).await["error"]["code"], "ZONE_UNAVAILABLE");
    }
}
