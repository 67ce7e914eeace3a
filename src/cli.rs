//! Command-line interface for promgate
//!
//! Provides argument parsing and subcommand handling for the promgate binary.

use clap::{Parser, Subcommand};

use crate::config::Config;

/// HTTP routing server with built-in Prometheus request metrics
#[derive(Parser)]
#[command(name = "promgate")]
#[command(version)]
#[command(about = "HTTP routing server with built-in Prometheus request metrics")]
#[command(
    long_about = "promgate answers requests from a static route table and counts every \
    dispatched request by address family, host, protocol, route and server name. \
    Counters are exposed in Prometheus text format on a metrics endpoint."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate the configuration file and print a summary
    Check,
}

/// Human-readable summary of a validated configuration
pub fn check_summary(config: &Config) -> String {
    let metrics = &config.metrics;
    let endpoint = if metrics.use_server_addr() {
        format!("{}{} (application listener)", config.server.bind_address(), metrics.path())
    } else {
        format!("{}{}", metrics.address(), metrics.path())
    };

    let mut summary = format!(
        "Configuration OK\n  listen:  {}\n  server:  {}\n  metrics: {}\n  counter: {}\n  routes:  {}\n",
        config.server.bind_address(),
        config.server.name,
        endpoint,
        metrics.metric_name("request_count_total"),
        config.routes.len(),
    );
    for route in &config.routes {
        let host = route.host().unwrap_or("*");
        summary.push_str(&format!("    {} {} -> {}\n", host, route.path(), route.name()));
    }
    summary
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# promgate Configuration
# =======================
#
# This file configures the HTTP server, the static route table, the
# Prometheus metrics endpoint and logging for promgate.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 8080

# Value of the `server` label on every request metric
name = "Caddy"

# ─────────────────────────────────────────────────────────────────────────────
# ROUTES
# ─────────────────────────────────────────────────────────────────────────────
#
# Routes match the request path exactly. A route with `host` only matches
# requests for that host and wins over a route without one.
#
# Route fields:
#   - path: Exact request path (must start with '/')
#   - name: `route_name` label value (defaults to path)
#   - host: Optional host restriction (case-insensitive)
#   - body: Literal response body
#   - error: Makes the route fail with this message (exclusive with body)
#   - status: Response status (default 200, or 500 for error routes)

[[routes]]
path = "/path1"
body = "Hello path1"

[[routes]]
path = "/path2"
body = "Hello path2"

# A failing route, counted like any other:
# [[routes]]
# path = "/proxy"
# error = "no hosts available upstream"
# status = 502

# ─────────────────────────────────────────────────────────────────────────────
# METRICS
# ─────────────────────────────────────────────────────────────────────────────
#
# Metric names are <namespace>_<subsystem>_<metric>, e.g.
# caddy2_http_request_count_total

[metrics]
namespace = "caddy2"
subsystem = "http"

# Path of the metrics endpoint
path = "/metrics"

# Standalone metrics listener (default "localhost:9180")
address = "localhost:9180"

# Serve metrics on the application listener instead of `address`
# use_server_addr = true

# Fixed value for the `host` label instead of the request host
# hostname = "caddy"

# Histogram buckets (seconds and bytes)
# latency_buckets = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
# size_buckets = [256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0, 1048576.0, 4194304.0]

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG overrides this when set
log_level = "info"
"#
}
