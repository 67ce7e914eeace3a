//! Integration tests for configuration validation
//!
//! Verifies that invalid configurations are rejected at startup (Config::from_file())
//! rather than causing runtime errors. Tests the full path: file → parse → validate.

use promgate::config::Config;
use promgate::error::AppError;
use std::io::Write;
use tempfile::NamedTempFile;

/// Helper to create a temporary config file with given TOML content
fn create_temp_config(toml_content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(toml_content.as_bytes())
        .expect("Failed to write temp file");
    temp_file.flush().expect("Failed to flush temp file");
    temp_file
}

fn with_routes(routes: &str, metrics: &str) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = 8080
name = "Caddy"

{}

[metrics]
namespace = "caddy2"
{}
"#,
        routes, metrics
    )
}

fn assert_rejected(toml_content: &str, expected: &str) {
    let temp_file = create_temp_config(toml_content);
    let result = Config::from_file(temp_file.path());

    match result {
        Err(AppError::ConfigValidationFailed { path, reason }) => {
            assert_eq!(path, temp_file.path().display().to_string());
            assert!(
                reason.contains(expected),
                "reason should mention '{}', got: {}",
                expected,
                reason
            );
        }
        other => panic!(
            "expected ConfigValidationFailed, got {:?}",
            other.map(|_| ())
        ),
    }
}

const PATH1: &str = r#"
[[routes]]
path = "/path1"
body = "Hello path1"
"#;

#[test]
fn test_valid_config_loads() {
    let temp_file = create_temp_config(&with_routes(PATH1, ""));
    let config = Config::from_file(temp_file.path()).expect("valid config should load");

    assert_eq!(config.server.name, "Caddy");
    assert_eq!(config.routes.len(), 1);
    assert_eq!(
        config.metrics.metric_name("request_count_total"),
        "caddy2_http_request_count_total"
    );
}

#[test]
fn test_missing_file_keeps_io_context() {
    let result = Config::from_file("/nonexistent/promgate.toml");
    match result {
        Err(AppError::ConfigFileRead { path, source }) => {
            assert_eq!(path, "/nonexistent/promgate.toml");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected ConfigFileRead, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_malformed_toml_keeps_parse_context() {
    let temp_file = create_temp_config("[server\nport = 8080");
    let result = Config::from_file(temp_file.path());
    assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
}

#[test]
fn test_unknown_route_field_is_a_parse_error() {
    let temp_file = create_temp_config(&with_routes(
        r#"
[[routes]]
path = "/path1"
bodyy = "typo"
"#,
        "",
    ));
    let result = Config::from_file(temp_file.path());
    assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
}

#[test]
fn test_rejects_empty_route_table() {
    assert_rejected(&with_routes("", ""), "no routes configured");
}

#[test]
fn test_rejects_relative_route_path() {
    assert_rejected(
        &with_routes("[[routes]]\npath = \"path1\"\n", ""),
        "must start with '/'",
    );
}

#[test]
fn test_rejects_duplicate_routes_case_insensitive_host() {
    assert_rejected(
        &with_routes(
            r#"
[[routes]]
path = "/path1"
host = "Caddy"

[[routes]]
path = "/path1"
host = "caddy"
"#,
            "",
        ),
        "duplicate route",
    );
}

#[test]
fn test_same_path_on_different_hosts_is_allowed() {
    let temp_file = create_temp_config(&with_routes(
        r#"
[[routes]]
path = "/path1"

[[routes]]
path = "/path1"
host = "caddy"
"#,
        "",
    ));
    assert!(Config::from_file(temp_file.path()).is_ok());
}

#[test]
fn test_rejects_body_and_error_together() {
    assert_rejected(
        &with_routes(
            "[[routes]]\npath = \"/x\"\nbody = \"ok\"\nerror = \"boom\"\n",
            "",
        ),
        "both 'body' and 'error'",
    );
}

#[test]
fn test_rejects_out_of_range_status() {
    assert_rejected(
        &with_routes("[[routes]]\npath = \"/x\"\nstatus = 600\n", ""),
        "invalid status 600",
    );
}

#[test]
fn test_rejects_successful_status_on_error_route() {
    assert_rejected(
        &with_routes(
            "[[routes]]\npath = \"/x\"\nerror = \"boom\"\nstatus = 200\n",
            "",
        ),
        "4xx or 5xx",
    );
}

#[test]
fn test_rejects_address_with_use_server_addr() {
    assert_rejected(
        &with_routes(
            PATH1,
            "address = \"localhost:9180\"\nuse_server_addr = true",
        ),
        "may not be used together",
    );
}

#[test]
fn test_rejects_metrics_path_colliding_with_route_on_server_addr() {
    assert_rejected(
        &with_routes(
            "[[routes]]\npath = \"/metrics\"\n",
            "use_server_addr = true",
        ),
        "collides with route",
    );
}

#[test]
fn test_metrics_path_may_equal_route_on_separate_listener() {
    let temp_file = create_temp_config(&with_routes("[[routes]]\npath = \"/metrics\"\n", ""));
    assert!(Config::from_file(temp_file.path()).is_ok());
}

#[test]
fn test_rejects_non_increasing_buckets() {
    assert_rejected(
        &with_routes(PATH1, "latency_buckets = [0.5, 0.1]"),
        "strictly increasing",
    );
}

#[test]
fn test_rejects_empty_size_buckets() {
    assert_rejected(
        &with_routes(PATH1, "size_buckets = []"),
        "1 or more buckets",
    );
}

#[test]
fn test_rejects_metrics_path_with_router_syntax() {
    for path in ["/{x}", "/:x", "/*x", "/metrics/{rest}"] {
        assert_rejected(
            &with_routes(
                PATH1,
                &format!("use_server_addr = true\npath = \"{}\"", path),
            ),
            "must be a literal path",
        );
    }
}

#[test]
fn test_rejects_metrics_path_with_router_syntax_on_separate_listener() {
    assert_rejected(
        &with_routes(PATH1, "path = \"/{x}\""),
        "must be a literal path",
    );
}
