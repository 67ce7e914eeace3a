//! Prometheus metrics endpoint
//!
//! Exposes metrics in Prometheus text format for scraping. Scrapes are not
//! counted as application requests.

use axum::{
    extract::State,
    http::{StatusCode, header},
};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;

/// Content type of the Prometheus text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` with a JSON error body if metrics encoding fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:9180/metrics
/// # HELP caddy2_http_request_count_total Counter of HTTP(S) requests made, by route.
/// # TYPE caddy2_http_request_count_total counter
/// caddy2_http_request_count_total{family="1",host="caddy",proto="1.1",route_name="/path1",server="Caddy"} 1
/// ```
pub async fn handler(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, [(header::HeaderName, &'static str); 1], String)> {
    let output = state.metrics().render().map_err(|e| {
        tracing::error!(
            error = %e,
            "Failed to render metrics for Prometheus scraping"
        );
        AppError::Metrics(e)
    })?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], output))
}
