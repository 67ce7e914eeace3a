//! Route handlers
//!
//! A handler turns a matched request into a status and body, or fails with
//! an error status. Handlers run in-process on the request task.

use crate::config::RouteAction;
use async_trait::async_trait;
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Successful handler output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RouteResponse {
    /// 200 response with a literal body
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }
}

impl IntoResponse for RouteResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

/// Handler failure, answered with `status`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Trait for route handlers
///
/// Allows routes to be backed by configured responses or by custom code,
/// e.g. handlers in tests that fail on demand.
#[async_trait]
pub trait RouteHandler: Send + Sync + fmt::Debug {
    /// Produce the response for a matched request
    async fn respond(&self, request: &Parts) -> Result<RouteResponse, HandlerError>;
}

/// Answers every request with a fixed status and body
#[derive(Debug, Clone)]
pub struct Respond {
    status: StatusCode,
    body: String,
}

impl Respond {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
impl RouteHandler for Respond {
    async fn respond(&self, _request: &Parts) -> Result<RouteResponse, HandlerError> {
        Ok(RouteResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Fails every request with a fixed status and message
#[derive(Debug, Clone)]
pub struct Fail {
    status: StatusCode,
    message: String,
}

impl Fail {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
impl RouteHandler for Fail {
    async fn respond(&self, _request: &Parts) -> Result<RouteResponse, HandlerError> {
        Err(HandlerError::new(self.status, self.message.clone()))
    }
}

/// Handler backed by a synchronous closure
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a closure as a route handler
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Parts) -> Result<RouteResponse, HandlerError> + Send + Sync,
{
    FnHandler { f }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> RouteHandler for FnHandler<F>
where
    F: Fn(&Parts) -> Result<RouteResponse, HandlerError> + Send + Sync,
{
    async fn respond(&self, request: &Parts) -> Result<RouteResponse, HandlerError> {
        (self.f)(request)
    }
}

impl From<RouteAction> for Box<dyn RouteHandler> {
    fn from(action: RouteAction) -> Self {
        match action {
            RouteAction::Respond { status, body } => Box::new(Respond::new(status, body)),
            RouteAction::Fail { status, message } => Box::new(Fail::new(status, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_respond_returns_configured_body() {
        let handler = Respond::new(StatusCode::OK, "Hello path1");
        let response = handler.respond(&parts("/path1")).await.unwrap();
        assert_eq!(response, RouteResponse::ok("Hello path1"));
    }

    #[tokio::test]
    async fn test_fail_returns_error_status() {
        let handler = Fail::new(StatusCode::BAD_GATEWAY, "no hosts available upstream");
        let err = handler.respond(&parts("/proxy")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "no hosts available upstream");
    }

    #[tokio::test]
    async fn test_handler_fn_sees_request() {
        let handler = handler_fn(|parts: &Parts| Ok(RouteResponse::ok(parts.uri.path())));
        let response = handler.respond(&parts("/echo")).await.unwrap();
        assert_eq!(response.body, "/echo");
    }

    #[tokio::test]
    async fn test_route_action_converts_to_handler() {
        let handler: Box<dyn RouteHandler> = RouteAction::Fail {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "down".to_string(),
        }
        .into();
        let err = handler.respond(&parts("/")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_route_response_into_response_keeps_status() {
        let response = RouteResponse {
            status: StatusCode::CREATED,
            body: "made".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
