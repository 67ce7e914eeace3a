//! Configuration management for promgate
//!
//! Parses TOML configuration files and provides typed access to settings.
//! The route table, the server identifier and the metrics endpoint are all
//! fixed at startup; there is no reload.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Default address of the standalone metrics listener
pub const DEFAULT_METRICS_ADDRESS: &str = "localhost:9180";

/// Default path of the metrics endpoint
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Value of the `server` label on every request metric
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl ServerConfig {
    /// `host:port` string handed to the listener
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_name() -> String {
    "promgate".to_string()
}

/// One entry of the static route table
///
/// A route either responds with a literal `body` or fails with an `error`
/// message. Fields are private; use the accessors, which apply defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    path: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status: Option<u16>,
}

/// What a configured route does when matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Answer with a literal body
    Respond { status: StatusCode, body: String },
    /// Fail the request with an error status
    Fail { status: StatusCode, message: String },
}

impl RouteConfig {
    /// Exact request path this route matches
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Route name used for the `route_name` label (defaults to the path)
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }

    /// Host restriction, if any
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Resolve body/error/status into the route's action
    ///
    /// Status defaults to 200 for responding routes and 500 for failing ones.
    /// Call after `Config::validate()`; an out-of-range status falls back to
    /// the default.
    pub fn action(&self) -> RouteAction {
        let status = |default: StatusCode| {
            self.status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(default)
        };

        match &self.error {
            Some(message) => RouteAction::Fail {
                status: status(StatusCode::INTERNAL_SERVER_ERROR),
                message: message.clone(),
            },
            None => RouteAction::Respond {
                status: status(StatusCode::OK),
                body: self.body.clone().unwrap_or_default(),
            },
        }
    }
}

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default = "default_subsystem")]
    subsystem: String,
    #[serde(default = "default_metrics_path")]
    path: String,
    /// Standalone listener address; mutually exclusive with `use_server_addr`
    #[serde(default)]
    address: Option<String>,
    /// Serve the metrics path on the main listener instead
    #[serde(default)]
    use_server_addr: bool,
    /// Fixed value for the `host` label, overriding the request host
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    latency_buckets: Option<Vec<f64>>,
    #[serde(default)]
    size_buckets: Option<Vec<f64>>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            subsystem: default_subsystem(),
            path: default_metrics_path(),
            address: None,
            use_server_addr: false,
            hostname: None,
            latency_buckets: None,
            size_buckets: None,
        }
    }
}

fn default_namespace() -> String {
    "promgate".to_string()
}

fn default_subsystem() -> String {
    "http".to_string()
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

impl MetricsConfig {
    /// Path the exposition endpoint answers on
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Address of the standalone metrics listener
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_METRICS_ADDRESS)
    }

    pub fn use_server_addr(&self) -> bool {
        self.use_server_addr
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Fully-qualified metric name: `<namespace>_<subsystem>_<name>`
    ///
    /// Empty namespace or subsystem parts are skipped.
    pub fn metric_name(&self, name: &str) -> String {
        [self.namespace.as_str(), self.subsystem.as_str(), name]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Histogram buckets for durations, in seconds
    pub fn latency_buckets(&self) -> Vec<f64> {
        self.latency_buckets
            .clone()
            .unwrap_or_else(|| prometheus::DEFAULT_BUCKETS.to_vec())
    }

    /// Histogram buckets for response sizes, in bytes
    ///
    /// Defaults to 8 exponential buckets starting at 256 with factor 4.
    pub fn size_buckets(&self) -> Vec<f64> {
        self.size_buckets
            .clone()
            .unwrap_or_else(|| (0..8).map(|i| 256.0 * 4f64.powi(i)).collect())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn is_metric_name_fragment(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        None => true,
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
    }
}

fn validate_buckets(field: &str, buckets: &[f64]) -> crate::error::AppResult<()> {
    if buckets.is_empty() {
        return Err(crate::error::AppError::Config(format!(
            "metrics.{} must specify 1 or more buckets",
            field
        )));
    }
    if let Some(bad) = buckets.iter().find(|b| !b.is_finite()) {
        return Err(crate::error::AppError::Config(format!(
            "metrics.{} contains invalid bucket {} - must be a finite number",
            field, bad
        )));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(crate::error::AppError::Config(format!(
            "metrics.{} must be strictly increasing, got {:?}",
            field, buckets
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config
        config
            .validate()
            .map_err(|e| crate::error::AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> crate::error::AppResult<()> {
        // ═══════════════════════════════════════════════════════════════════════
        // Phase 1: Route table
        // ═══════════════════════════════════════════════════════════════════════
        if self.routes.is_empty() {
            return Err(crate::error::AppError::Config(
                "Configuration error: no routes configured. Add at least one entry:\n\n\
                [[routes]]\n\
                path = \"/path1\"\n\
                body = \"Hello path1\""
                    .to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for route in &self.routes {
            if !route.path.starts_with('/') {
                return Err(crate::error::AppError::Config(format!(
                    "Configuration error: route path '{}' must start with '/'",
                    route.path
                )));
            }

            let host_key = route.host.as_deref().map(str::to_ascii_lowercase);
            if !seen.insert((host_key, route.path.as_str())) {
                return Err(crate::error::AppError::Config(format!(
                    "Configuration error: duplicate route for path '{}' (host {:?})",
                    route.path, route.host
                )));
            }

            if route.body.is_some() && route.error.is_some() {
                return Err(crate::error::AppError::Config(format!(
                    "Configuration error: route '{}' sets both 'body' and 'error'",
                    route.name()
                )));
            }

            if let Some(status) = route.status {
                if !(100..=599).contains(&status) {
                    return Err(crate::error::AppError::Config(format!(
                        "Configuration error: route '{}' has invalid status {}. \
                        Status must be between 100 and 599.",
                        route.name(),
                        status
                    )));
                }
                if route.error.is_some() && status < 400 {
                    return Err(crate::error::AppError::Config(format!(
                        "Configuration error: error route '{}' has status {}. \
                        Error routes must use a 4xx or 5xx status.",
                        route.name(),
                        status
                    )));
                }
            }
        }

        // ═══════════════════════════════════════════════════════════════════════
        // Phase 2: Metrics endpoint
        // ═══════════════════════════════════════════════════════════════════════
        let metrics = &self.metrics;

        if metrics.address.is_some() && metrics.use_server_addr {
            return Err(crate::error::AppError::Config(
                "Configuration error: metrics.address and metrics.use_server_addr \
                may not be used together"
                    .to_string(),
            ));
        }

        if !metrics.path.starts_with('/') {
            return Err(crate::error::AppError::Config(format!(
                "Configuration error: metrics.path '{}' must start with '/'",
                metrics.path
            )));
        }

        // The path is mounted as a router path, where these start captures
        // and wildcards
        if let Some(c) = metrics.path.chars().find(|c| matches!(c, '{' | '}' | ':' | '*')) {
            return Err(crate::error::AppError::Config(format!(
                "Configuration error: metrics.path '{}' contains '{}'. \
                The metrics path must be a literal path.",
                metrics.path, c
            )));
        }

        if metrics.use_server_addr
            && let Some(route) = self.routes.iter().find(|r| r.path == metrics.path)
        {
            return Err(crate::error::AppError::Config(format!(
                "Configuration error: metrics.path '{}' collides with route '{}' \
                while use_server_addr is enabled",
                metrics.path,
                route.name()
            )));
        }

        for (field, value) in [
            ("namespace", &metrics.namespace),
            ("subsystem", &metrics.subsystem),
        ] {
            if !is_metric_name_fragment(value) {
                return Err(crate::error::AppError::Config(format!(
                    "Configuration error: metrics.{} '{}' is not a valid metric name \
                    fragment ([a-zA-Z_][a-zA-Z0-9_]*)",
                    field, value
                )));
            }
        }

        if let Some(buckets) = &metrics.latency_buckets {
            validate_buckets("latency_buckets", buckets)?;
        }
        if let Some(buckets) = &metrics.size_buckets {
            validate_buckets("size_buckets", buckets)?;
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        // Validate config before returning
        config.validate()?;
        Ok(config)
    }
}
