//! Route matching for promgate
//!
//! The route table is built once at startup and is read-only afterwards.
//! Matching is by exact path. When several routes share a path, a route
//! bound to the request's host wins over a host-agnostic one.

pub mod handler;

pub use handler::{Fail, HandlerError, Respond, RouteHandler, RouteResponse, handler_fn};

use crate::config::RouteConfig;
use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;

/// A named mapping from host/path to a handler
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    path: String,
    host: Option<String>,
    handler: Arc<dyn RouteHandler>,
}

impl Route {
    /// Create a host-agnostic route
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        handler: impl RouteHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            host: None,
            handler: Arc::new(handler),
        }
    }

    /// Restrict the route to one host (compared case-insensitively)
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into().to_ascii_lowercase());
        self
    }

    /// Build a route from its configuration entry
    pub fn from_config(config: &RouteConfig) -> Self {
        let handler: Box<dyn RouteHandler> = config.action().into();
        Self {
            name: config.name().to_string(),
            path: config.path().to_string(),
            host: config.host().map(str::to_ascii_lowercase),
            handler: Arc::from(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn handler(&self) -> &dyn RouteHandler {
        self.handler.as_ref()
    }
}

/// Immutable route table
#[derive(Debug, Default)]
pub struct RouteTable {
    /// Routes by exact path; host-specific routes are checked before host-agnostic ones
    by_path: HashMap<String, Vec<Route>>,
    len: usize,
}

impl RouteTable {
    /// Build a table from routes
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if two routes share both path and host.
    pub fn new(routes: Vec<Route>) -> AppResult<Self> {
        let mut by_path: HashMap<String, Vec<Route>> = HashMap::new();
        let len = routes.len();

        for route in routes {
            let entries = by_path.entry(route.path.clone()).or_default();
            if entries.iter().any(|existing| existing.host == route.host) {
                return Err(AppError::Config(format!(
                    "duplicate route for path '{}' (host {:?})",
                    route.path, route.host
                )));
            }
            entries.push(route);
        }

        // Host-specific routes first, so resolve() can take the first hit
        for entries in by_path.values_mut() {
            entries.sort_by_key(|route| route.host.is_none());
        }

        tracing::debug!(routes = len, paths = by_path.len(), "Built route table");

        Ok(Self { by_path, len })
    }

    /// Build a table from the configured routes
    pub fn from_config(routes: &[RouteConfig]) -> AppResult<Self> {
        Self::new(routes.iter().map(Route::from_config).collect())
    }

    /// Resolve a request to a route
    ///
    /// Pure lookup. Returns `None` when no route matches `path` for `host`.
    pub fn resolve(&self, host: &str, path: &str) -> Option<&Route> {
        self.by_path.get(path)?.iter().find(|route| match &route.host {
            Some(route_host) => route_host.eq_ignore_ascii_case(host),
            None => true,
        })
    }

    /// Number of routes in the table
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over all routes (no particular order)
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.by_path.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn respond(body: &str) -> Respond {
        Respond::new(StatusCode::OK, body)
    }

    fn table() -> RouteTable {
        RouteTable::new(vec![
            Route::new("/path1", "/path1", respond("Hello path1")),
            Route::new("/path2", "/path2", respond("Hello path2")),
            Route::new("caddy-path2", "/path2", respond("Caddy path2")).with_host("Caddy"),
        ])
        .expect("table should build")
    }

    #[test]
    fn test_resolve_exact_path() {
        let table = table();
        let route = table.resolve("caddy", "/path1").expect("should match");
        assert_eq!(route.name(), "/path1");
        assert_eq!(route.path(), "/path1");
    }

    #[test]
    fn test_resolve_is_exact_not_prefix() {
        let table = table();
        assert!(table.resolve("caddy", "/path1/extra").is_none());
        assert!(table.resolve("caddy", "/path").is_none());
        assert!(table.resolve("caddy", "/").is_none());
    }

    #[test]
    fn test_host_specific_route_wins() {
        let table = table();
        assert_eq!(table.resolve("caddy", "/path2").unwrap().name(), "caddy-path2");
        assert_eq!(table.resolve("CADDY", "/path2").unwrap().name(), "caddy-path2");
        assert_eq!(table.resolve("other", "/path2").unwrap().name(), "/path2");
    }

    #[test]
    fn test_host_only_route_does_not_match_other_hosts() {
        let table = RouteTable::new(vec![
            Route::new("private", "/admin", respond("admin")).with_host("internal"),
        ])
        .unwrap();
        assert!(table.resolve("internal", "/admin").is_some());
        assert!(table.resolve("public", "/admin").is_none());
    }

    #[test]
    fn test_duplicate_routes_rejected() {
        let result = RouteTable::new(vec![
            Route::new("a", "/path1", respond("a")),
            Route::new("b", "/path1", respond("b")),
        ]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_len_and_iter() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
        assert_eq!(table.iter().count(), 3);
        assert!(RouteTable::default().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_builds_handlers() {
        let config: crate::config::Config = toml::from_str(
            r#"
[server]
port = 8080

[[routes]]
path = "/path1"
body = "Hello path1"

[[routes]]
path = "/boom"
name = "boom"
host = "Caddy"
error = "exploded"
status = 503
"#,
        )
        .unwrap();
        let table = RouteTable::from_config(&config.routes).unwrap();

        let parts = axum::http::Request::builder()
            .uri("/boom")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let boom = table.resolve("caddy", "/boom").expect("host is lowercased");
        let err = boom.handler().respond(&parts).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let path1 = table.resolve("anything", "/path1").unwrap();
        let ok = path1.handler().respond(&parts).await.unwrap();
        assert_eq!(ok.body, "Hello path1");
    }
}
