//! HTTP request handlers for promgate

use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::router::RouteTable;
use std::sync::Arc;

pub mod dispatch;
pub mod metrics;

/// Application state shared across all handlers
///
/// Contains configuration, the route table and the metrics registry.
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    routes: Arc<RouteTable>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new AppState from configuration
    ///
    /// Builds the route table from `config.routes` and registers all metric
    /// families.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let routes = RouteTable::from_config(&config.routes)?;
        Self::with_routes(config, routes)
    }

    /// Create a new AppState with a route table built in code
    pub fn with_routes(config: Arc<Config>, routes: RouteTable) -> AppResult<Self> {
        let metrics = Metrics::new(&config.metrics)?;

        Ok(Self {
            config,
            routes: Arc::new(routes),
            metrics: Arc::new(metrics),
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the route table
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Get reference to the metrics registry
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
