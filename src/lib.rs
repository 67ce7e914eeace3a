//! promgate - HTTP routing server with built-in Prometheus request metrics
//!
//! Requests are answered from a static route table and every dispatched
//! request is counted under its label set
//! (`family`, `host`, `proto`, `route_name`, `server`).

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod labels;
pub mod metrics;
pub mod router;
pub mod server;
pub mod telemetry;
