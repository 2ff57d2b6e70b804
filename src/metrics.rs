// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the dnsgate operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `dnsgate_firestoned_io_` (prometheus-safe version of
//! "dnsgate.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation operations and their outcomes
//! - **Probe Metrics** - Track probe checks and current health
//!
//! # Example
//!
//! ```rust,no_run
//! use dnsgate::metrics::record_reconciliation;
//!
//! record_reconciliation("DNSPolicy", "success", std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all dnsgate metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "dnsgate_firestoned_io";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the
/// `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `DNSPolicy`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `DNSPolicy`)
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of probe checks by result
///
/// Labels:
/// - `result`: `healthy` or `unhealthy`
pub static PROBE_CHECKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_probe_checks_total"),
        "Total number of probe checks by result",
    );
    let counter = CounterVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Current health of registered probes (1 healthy, 0 unhealthy)
///
/// Labels:
/// - `probe`: Probe identity (`namespace/name`)
pub static PROBE_HEALTHY: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_probe_healthy"),
        "Current health of registered probes (1 healthy, 0 unhealthy)",
    );
    let gauge = GaugeVec::new(opts, &["probe"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Record a finished reconciliation.
pub fn record_reconciliation(resource_type: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record one probe check outcome.
pub fn record_probe_check(probe: &str, healthy: bool) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    PROBE_CHECKS_TOTAL.with_label_values(&[result]).inc();
    PROBE_HEALTHY
        .with_label_values(&[probe])
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Drop the gauge series of a removed probe.
pub fn forget_probe(probe: &str) {
    let _ = PROBE_HEALTHY.remove_label_values(&[probe]);
}

/// Render all registered metrics in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if metric encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}
