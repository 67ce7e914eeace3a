//! Prometheus metrics collection for promgate
//!
//! Every request that resolves to a route is counted once under its
//! [`LabelSet`]. Alongside the request counter the registry keeps:
//! - request duration and response head latency histograms
//! - response size histogram and per-status response counter
//! - a counter for requests no route matched
//! - a counter for failures of the metrics pipeline itself
//!
//! Metrics are exposed in Prometheus text format by
//! [`crate::handlers::metrics`].

use crate::config::MetricsConfig;
use crate::labels::{LABEL_NAMES, LabelSet};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Label names of the per-status metric families
const STATUS_LABEL_NAMES: [&str; 6] = ["family", "host", "proto", "route_name", "server", "status"];

/// Label names of the unmatched request counter
const UNMATCHED_LABEL_NAMES: [&str; 4] = ["family", "host", "proto", "server"];

/// Response measurements recorded after a route handler ran
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseObservation {
    pub status: u16,
    /// Response body size in bytes
    pub size: u64,
    /// Time from request arrival until the response was complete
    pub duration: Duration,
    /// Time from request arrival until status and headers were ready
    pub latency: Duration,
}

/// Metrics registry for promgate
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    request_count: IntCounterVec,
    /// Ordered view of the request counters, keyed by label set
    ///
    /// Holds handles into `request_count`, so both always agree.
    request_index: Arc<RwLock<BTreeMap<LabelSet, IntCounter>>>,
    request_duration: HistogramVec,
    response_size: HistogramVec,
    response_status: IntCounterVec,
    response_latency: HistogramVec,
    unmatched_requests: IntCounterVec,
    recording_failures: IntCounterVec,
    request_count_name: String,
    unmatched_name: String,
    recording_failures_name: String,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metric families with a new Prometheus registry, named
    /// `<namespace>_<subsystem>_<metric>` per the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., invalid buckets
    /// or duplicate names).
    pub fn new(config: &MetricsConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let request_count_name = config.metric_name("request_count_total");
        let unmatched_name = config.metric_name("unmatched_request_count_total");
        let recording_failures_name = config.metric_name("metrics_recording_failures_total");

        let request_count = IntCounterVec::new(
            Opts::new(
                request_count_name.clone(),
                "Counter of HTTP(S) requests made, by route.",
            ),
            &LABEL_NAMES,
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                config.metric_name("request_duration_seconds"),
                "Histogram of the time (in seconds) each request took.",
            )
            .buckets(config.latency_buckets()),
            &LABEL_NAMES,
        )?;

        let response_size = HistogramVec::new(
            HistogramOpts::new(
                config.metric_name("response_size_bytes"),
                "Size of the returns response in bytes.",
            )
            .buckets(config.size_buckets()),
            &STATUS_LABEL_NAMES,
        )?;

        let response_status = IntCounterVec::new(
            Opts::new(
                config.metric_name("response_status_count_total"),
                "Counter of response status codes.",
            ),
            &STATUS_LABEL_NAMES,
        )?;

        let response_latency = HistogramVec::new(
            HistogramOpts::new(
                config.metric_name("response_latency_seconds"),
                "Histogram of the time (in seconds) until the first write for each request.",
            )
            .buckets(config.latency_buckets()),
            &STATUS_LABEL_NAMES,
        )?;

        // Requests that matched no route; kept apart so route counters only
        // ever see dispatched requests.
        let unmatched_requests = IntCounterVec::new(
            Opts::new(
                unmatched_name.clone(),
                "Counter of HTTP(S) requests that matched no route.",
            ),
            &UNMATCHED_LABEL_NAMES,
        )?;

        // Alert on any increment: the request was served but not fully counted.
        let recording_failures = IntCounterVec::new(
            Opts::new(
                recording_failures_name.clone(),
                "Counter of failed metric recordings by operation.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(request_count.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(response_size.clone()))?;
        registry.register(Box::new(response_status.clone()))?;
        registry.register(Box::new(response_latency.clone()))?;
        registry.register(Box::new(unmatched_requests.clone()))?;
        registry.register(Box::new(recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            request_count,
            request_index: Arc::new(RwLock::new(BTreeMap::new())),
            request_duration,
            response_size,
            response_status,
            response_latency,
            unmatched_requests,
            recording_failures,
            request_count_name,
            unmatched_name,
            recording_failures_name,
        })
    }

    /// Fully-qualified name of the request counter family
    pub fn request_count_name(&self) -> &str {
        &self.request_count_name
    }

    /// Count one dispatched request under `labels`
    ///
    /// Creates the counter at 1 if absent, otherwise adds 1. Safe under any
    /// number of concurrent callers: known label sets take the shared lock
    /// and do a single atomic add; new ones take the exclusive lock only for
    /// the insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the label values do not match the family.
    pub fn increment(&self, labels: &LabelSet) -> Result<(), prometheus::Error> {
        {
            let index = self
                .request_index
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = index.get(labels) {
                counter.inc();
                return Ok(());
            }
        }

        let mut index = self
            .request_index
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another caller may have inserted between the two locks
        if let Some(counter) = index.get(labels) {
            counter.inc();
            return Ok(());
        }

        let counter = self
            .request_count
            .get_metric_with_label_values(&labels.values())?;
        counter.inc();
        index.insert(labels.clone(), counter);

        tracing::debug!(
            family = %labels.family,
            host = %labels.host,
            proto = %labels.proto,
            route_name = %labels.route_name,
            server = %labels.server,
            "Created request counter"
        );
        Ok(())
    }

    /// Point-in-time copy of every request counter, ordered by label set
    pub fn snapshot(&self) -> Vec<(LabelSet, u64)> {
        let index = self
            .request_index
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        index
            .iter()
            .map(|(labels, counter)| (labels.clone(), counter.get()))
            .collect()
    }

    /// Current value of one request counter (0 when never incremented)
    pub fn request_count(&self, labels: &LabelSet) -> u64 {
        let index = self
            .request_index
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        index.get(labels).map(IntCounter::get).unwrap_or(0)
    }

    /// Record duration, latency, size and status of a dispatched request
    ///
    /// # Errors
    ///
    /// Returns an error if a duration is not finite or label values do not
    /// match a family. Nothing is recorded for the failing family.
    pub fn observe_response(
        &self,
        labels: &LabelSet,
        observation: ResponseObservation,
    ) -> Result<(), prometheus::Error> {
        let status = observation.status.to_string();
        let with_status = labels.values_with_status(&status);

        self.request_duration
            .get_metric_with_label_values(&labels.values())?
            .observe(observation.duration.as_secs_f64());
        self.response_size
            .get_metric_with_label_values(&with_status)?
            .observe(observation.size as f64);
        self.response_status
            .get_metric_with_label_values(&with_status)?
            .inc();
        self.response_latency
            .get_metric_with_label_values(&with_status)?
            .observe(observation.latency.as_secs_f64());
        Ok(())
    }

    /// Count a request that matched no route
    ///
    /// `route_name` of `labels` is ignored.
    pub fn record_unmatched(&self, labels: &LabelSet) -> Result<(), prometheus::Error> {
        self.unmatched_requests
            .get_metric_with_label_values(&Self::unmatched_values(labels))?
            .inc();
        Ok(())
    }

    /// Total number of unmatched requests across all label values
    pub fn unmatched_count(&self) -> u64 {
        self.family_total(&self.unmatched_name)
    }

    fn unmatched_values(labels: &LabelSet) -> [&str; 4] {
        [
            labels.family.as_str(),
            &labels.host,
            &labels.proto,
            &labels.server,
        ]
    }

    /// Record a failure of a metrics operation
    ///
    /// `operation` is one of "increment", "observe_response",
    /// "record_unmatched".
    pub fn recording_failure(&self, operation: &str) {
        self.recording_failures
            .with_label_values(&[operation])
            .inc();
    }

    /// Total number of failed metric recordings across all operations
    pub fn recording_failures_count(&self) -> u64 {
        self.family_total(&self.recording_failures_name)
    }

    /// Sum of all counter samples of one family
    fn family_total(&self, name: &str) -> u64 {
        let metric_families = self.registry.gather();
        metric_families
            .iter()
            .find(|mf| mf.name() == name)
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// Families are ordered by name and samples by label values, so two
    /// renders without intervening updates are byte-identical.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            let metric_names: Vec<_> = metric_families.iter().map(|mf| mf.name()).collect();

            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                metric_names = ?metric_names,
                "Prometheus text encoder failed"
            );

            prometheus::Error::Msg(format!(
                "Failed to encode {} metric families: {}. Metrics: {:?}",
                metric_count, e, metric_names
            ))
        })?;

        String::from_utf8(buffer).map_err(|e| {
            let valid_up_to = e.utf8_error().valid_up_to();

            tracing::error!(
                invalid_byte_index = valid_up_to,
                "Prometheus encoder produced invalid UTF-8"
            );

            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                valid_up_to, e
            ))
        })
    }
}
