//! Request dispatcher
//!
//! Fallback handler of the application router. Resolves the route, runs its
//! handler and counts the request exactly once under its label set.

use axum::{
    body::HttpBody,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use std::time::Instant;

use crate::error::AppError;
use crate::handlers::AppState;
use crate::labels::{LabelSet, RequestFacts};
use crate::metrics::ResponseObservation;

/// Dispatch a request to its route
///
/// # Response
///
/// - the route handler's status and body on success
/// - the handler's error status with a JSON error body on handler failure
/// - `404 Not Found` when no route matches (counted as unmatched only)
///
/// Metric recording failures are logged and never change the response.
pub async fn handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let (parts, _body) = request.into_parts();
    let facts = RequestFacts::from_parts(&parts);
    let path = parts.uri.path();

    let config = state.config();
    let server = config.server.name.as_str();
    let host_override = config.metrics.hostname();

    let Some(route) = state
        .routes()
        .resolve(facts.host.as_deref().unwrap_or_default(), path)
    else {
        let labels = facts.label_set(host_override, "", server);
        if let Err(e) = state.metrics().record_unmatched(&labels) {
            tracing::error!(error = %e, "Failed to record unmatched request");
            state.metrics().recording_failure("record_unmatched");
        }

        tracing::debug!(
            host = %facts.host_label(),
            path = %path,
            method = %parts.method,
            "No route matched"
        );

        return AppError::RouteNotFound {
            host: facts.host_label().to_string(),
            path: path.to_string(),
        }
        .into_response();
    };

    let labels = facts.label_set(host_override, route.name(), server);
    let outcome = route.handler().respond(&parts).await;
    let latency = start.elapsed();

    let response = match outcome {
        Ok(route_response) => route_response.into_response(),
        Err(e) => {
            tracing::warn!(
                route = %route.name(),
                status = e.status.as_u16(),
                error = %e,
                "Route handler failed"
            );
            AppError::HandlerFailure {
                route: route.name().to_string(),
                status: e.status,
                reason: e.message,
            }
            .into_response()
        }
    };

    let size_hint = response.body().size_hint();
    let observation = ResponseObservation {
        status: response.status().as_u16(),
        size: size_hint.exact().unwrap_or(size_hint.lower()),
        duration: start.elapsed(),
        latency,
    };
    record(&state, &labels, observation);

    tracing::debug!(
        route = %labels.route_name,
        host = %labels.host,
        proto = %labels.proto,
        status = observation.status,
        duration_ms = observation.duration.as_secs_f64() * 1000.0,
        "Dispatched request"
    );

    response
}

/// Count the request once and record its response measurements
fn record(state: &AppState, labels: &LabelSet, observation: ResponseObservation) {
    let metrics = state.metrics();

    if let Err(e) = metrics.increment(labels) {
        tracing::error!(
            error = %e,
            route = %labels.route_name,
            "Failed to increment request counter"
        );
        metrics.recording_failure("increment");
    }

    if let Err(e) = metrics.observe_response(labels, observation) {
        tracing::error!(
            error = %e,
            route = %labels.route_name,
            "Failed to record response metrics"
        );
        metrics.recording_failure("observe_response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::labels::AddressFamily;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{StatusCode, Version},
    };
    use std::net::{Ipv6Addr, SocketAddr};
    use std::str::FromStr;
    use std::sync::Arc;

    fn create_test_state() -> AppState {
        let config = Config::from_str(
            r#"
[server]
port = 8080
name = "Caddy"

[[routes]]
path = "/path1"
body = "Hello path1"

[[routes]]
path = "/proxy"
error = "no hosts available upstream"
status = 502

[metrics]
namespace = "caddy2"
"#,
        )
        .expect("should parse config");
        AppState::new(Arc::new(config)).expect("should create state")
    }

    fn request(uri: &str, host: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("host", host)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn path1_labels(proto: &str) -> LabelSet {
        LabelSet::new(AddressFamily::V4, "caddy", proto, "/path1", "Caddy")
    }

    #[tokio::test]
    async fn test_dispatch_returns_route_body_and_counts_once() {
        let state = create_test_state();

        let response = handler(State(state.clone()), request("/path1", "caddy")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Hello path1");

        assert_eq!(state.metrics().request_count(&path1_labels("1.1")), 1);
        let output = state.metrics().render().unwrap();
        assert!(output.contains(
            "caddy2_http_response_status_count_total{family=\"1\",host=\"caddy\",proto=\"1.1\",route_name=\"/path1\",server=\"Caddy\",status=\"200\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_uses_negotiated_version() {
        let state = create_test_state();
        let mut req = request("/path1", "caddy");
        *req.version_mut() = Version::HTTP_2;

        handler(State(state.clone()), req).await;

        assert_eq!(state.metrics().request_count(&path1_labels("2.0")), 1);
        assert_eq!(state.metrics().request_count(&path1_labels("1.1")), 0);
    }

    #[tokio::test]
    async fn test_dispatch_reads_family_from_connect_info() {
        let state = create_test_state();
        let mut req = request("/path1", "caddy");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((Ipv6Addr::LOCALHOST, 4000))));

        handler(State(state.clone()), req).await;

        let v6 = LabelSet {
            family: AddressFamily::V6,
            ..path1_labels("1.1")
        };
        assert_eq!(state.metrics().request_count(&v6), 1);
    }

    #[tokio::test]
    async fn test_handler_failure_is_counted_with_status() {
        let state = create_test_state();

        let response = handler(State(state.clone()), request("/proxy", "caddy")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_string(response).await.contains("no hosts available upstream"));

        let labels = LabelSet::new(AddressFamily::V4, "caddy", "1.1", "/proxy", "Caddy");
        assert_eq!(state.metrics().request_count(&labels), 1);
        let output = state.metrics().render().unwrap();
        assert!(output.contains("route_name=\"/proxy\",server=\"Caddy\",status=\"502\"} 1"));
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404_and_not_a_route_count() {
        let state = create_test_state();

        let response = handler(State(state.clone()), request("/nope", "caddy")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert!(state.metrics().snapshot().is_empty());
        assert_eq!(state.metrics().unmatched_count(), 1);
        let output = state.metrics().render().unwrap();
        assert!(output.contains(
            "caddy2_http_unmatched_request_count_total{family=\"1\",host=\"caddy\",proto=\"1.1\",server=\"Caddy\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_missing_host_is_labelled_dash() {
        let state = create_test_state();
        let req = Request::builder()
            .uri("/path1")
            .body(Body::empty())
            .unwrap();

        handler(State(state.clone()), req).await;

        let labels = LabelSet {
            host: "-".to_string(),
            ..path1_labels("1.1")
        };
        assert_eq!(state.metrics().request_count(&labels), 1);
    }
}
