//! Metric label derivation
//!
//! Every dispatched request is counted under a [`LabelSet`]: the address
//! family of the peer, the requested host, the negotiated HTTP version, the
//! resolved route name and the static server identifier. This module turns
//! the raw facts of a request into those values.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Uri, Version, header, request::Parts};
use std::fmt;
use std::net::SocketAddr;

/// Label value used when the request host cannot be determined
pub const UNKNOWN_HOST: &str = "-";

/// Label names of the request counter, in exposition order
pub const LABEL_NAMES: [&str; 5] = ["family", "host", "proto", "route_name", "server"];

/// IP family of the connection a request arrived on
///
/// Rendered as `"1"` for IPv4 and `"2"` for IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Convert family to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "1",
            AddressFamily::V6 => "2",
        }
    }

    /// Family of a peer address
    ///
    /// IPv4-mapped IPv6 peers (dual-stack listeners) count as IPv4. An
    /// unknown peer is reported as IPv4.
    pub fn of_peer(peer: Option<&SocketAddr>) -> Self {
        match peer {
            Some(SocketAddr::V6(addr)) if addr.ip().to_ipv4_mapped().is_none() => {
                AddressFamily::V6
            }
            _ => AddressFamily::V4,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique key of one request counter
///
/// Field order matches alphabetical label order, so the derived `Ord`
/// sorts label sets the same way the exposition format does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet {
    pub family: AddressFamily,
    pub host: String,
    pub proto: String,
    pub route_name: String,
    pub server: String,
}

impl LabelSet {
    pub fn new(
        family: AddressFamily,
        host: impl Into<String>,
        proto: impl Into<String>,
        route_name: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            family,
            host: host.into(),
            proto: proto.into(),
            route_name: route_name.into(),
            server: server.into(),
        }
    }

    /// Label values in [`LABEL_NAMES`] order
    pub fn values(&self) -> [&str; 5] {
        [
            self.family.as_str(),
            &self.host,
            &self.proto,
            &self.route_name,
            &self.server,
        ]
    }

    /// Label values followed by a response status
    pub fn values_with_status<'a>(&'a self, status: &'a str) -> [&'a str; 6] {
        [
            self.family.as_str(),
            &self.host,
            &self.proto,
            &self.route_name,
            &self.server,
            status,
        ]
    }
}

/// Protocol label for a negotiated HTTP version (`"1.1"`, `"2.0"`, ...)
pub fn proto_label(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_11 {
        "1.1"
    } else if version == Version::HTTP_2 {
        "2.0"
    } else if version == Version::HTTP_3 {
        "3.0"
    } else {
        "-"
    }
}

/// Normalize a `Host` value: strip the port, unwrap IPv6 brackets, lowercase
///
/// Returns `None` when the value cannot be split into host and port.
pub fn normalize_host(raw: &str) -> Option<String> {
    let host = if let Some(rest) = raw.strip_prefix('[') {
        let (inner, after) = rest.split_once(']')?;
        if !after.is_empty() && !after.starts_with(':') {
            return None;
        }
        inner
    } else {
        match raw.split_once(':') {
            Some((_, port)) if port.contains(':') => return None,
            Some((host, _)) => host,
            None => raw,
        }
    };

    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Per-request facts that feed the label set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFacts {
    pub family: AddressFamily,
    /// Normalized host, `None` when missing or unparsable
    pub host: Option<String>,
    pub proto: &'static str,
}

impl RequestFacts {
    /// Collect facts from request parts
    ///
    /// The peer address is taken from axum's `ConnectInfo<SocketAddr>`
    /// extension when the server was started with connect info.
    pub fn from_parts(parts: &Parts) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr);

        Self {
            family: AddressFamily::of_peer(peer),
            host: request_host(&parts.headers, &parts.uri),
            proto: proto_label(parts.version),
        }
    }

    /// Host used for the `host` label when no override is configured
    pub fn host_label(&self) -> &str {
        self.host.as_deref().unwrap_or(UNKNOWN_HOST)
    }

    /// Build the label set for a resolved route
    pub fn label_set(&self, host_override: Option<&str>, route_name: &str, server: &str) -> LabelSet {
        LabelSet::new(
            self.family,
            host_override.unwrap_or_else(|| self.host_label()),
            self.proto,
            route_name,
            server,
        )
    }
}

/// Host of a request: the `Host` header, falling back to the URI authority (HTTP/2)
fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    match headers.get(header::HOST) {
        Some(value) => normalize_host(value.to_str().ok()?),
        None => normalize_host(uri.authority()?.as_str()),
    }
}
