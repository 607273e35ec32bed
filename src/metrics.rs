// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the deployment manager.
//!
//! All metrics carry the namespace prefix `starlingx_windriver_com_`
//! (prometheus-safe version of "starlingx.windriver.com").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Reconcile outcomes, durations and requeues
//! - **Platform Metrics** - Platform resource changes and client resets
//! - **Notification Metrics** - Annotation bumps sent to wake reconcilers
//! - **Orchestration Metrics** - Strategy transitions and running monitors
//!
//! # Example
//!
//! ```rust,no_run
//! use deployment_manager::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("DataNetwork", std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all deployment manager metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "starlingx_windriver_com";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is registered once");
    counter
}

fn gauge(name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let gauge = GaugeVec::new(opts, labels).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("metric is registered once");
    gauge
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `Host`, `DataNetwork`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "reconciliations_total",
        "Total number of reconciliations by resource type and status",
        &["resource_type", "status"],
    )
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram =
        HistogramVec::new(opts, &["resource_type"]).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("metric is registered once");
    histogram
});

/// Total number of requeue decisions
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `policy`: Retry policy chosen by the classifier
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "requeues_total",
        "Total number of requeue decisions by resource type and retry policy",
        &["resource_type", "policy"],
    )
});

// ============================================================================
// Platform Metrics
// ============================================================================

/// Total number of platform resources changed
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `operation`: `create`, `update` or `delete`
pub static PLATFORM_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "platform_changes_total",
        "Total number of platform resources created, updated or deleted",
        &["resource_type", "operation"],
    )
});

/// Total number of platform client resets
///
/// Labels:
/// - `namespace`: Namespace whose client was discarded
pub static CLIENT_RESETS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "platform_client_resets_total",
        "Total number of platform client resets by namespace",
        &["namespace"],
    )
});

// ============================================================================
// Notification and Orchestration Metrics
// ============================================================================

/// Total number of notifications sent
///
/// Labels:
/// - `resource_type`: Kind of the notified object
pub static NOTIFICATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "notifications_total",
        "Total number of notification annotation bumps by resource type",
        &["resource_type"],
    )
});

/// Total number of strategy transitions
///
/// Labels:
/// - `state`: Strategy state observed or action taken
pub static STRATEGY_TRANSITIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "strategy_transitions_total",
        "Total number of update strategy transitions by state",
        &["state"],
    )
});

/// Number of running monitors
///
/// Labels:
/// - `monitor`: Monitor name
pub static MONITORS_ACTIVE: LazyLock<GaugeVec> = LazyLock::new(|| {
    gauge(
        "monitors_active",
        "Number of running monitors by name",
        &["monitor"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - Kind of resource reconciled
/// * `duration` - Time taken for reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - Kind of resource reconciled
/// * `duration` - Time taken before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a requeue decision
pub fn record_requeue(resource_type: &str, policy: &str) {
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, policy])
        .inc();
}

/// Record a platform resource change
pub fn record_platform_change(resource_type: &str, operation: &str) {
    PLATFORM_CHANGES_TOTAL
        .with_label_values(&[resource_type, operation])
        .inc();
}

/// Record a platform client reset
pub fn record_client_reset(namespace: &str) {
    CLIENT_RESETS_TOTAL.with_label_values(&[namespace]).inc();
}

/// Record a notification sent to an object
pub fn record_notification(resource_type: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[resource_type]).inc();
}

/// Record a strategy transition
pub fn record_strategy_transition(state: &str) {
    STRATEGY_TRANSITIONS_TOTAL.with_label_values(&[state]).inc();
}

/// Record a monitor starting
pub fn record_monitor_started(monitor: &str) {
    MONITORS_ACTIVE.with_label_values(&[monitor]).inc();
}

/// Record a monitor exiting
pub fn record_monitor_stopped(monitor: &str) {
    MONITORS_ACTIVE.with_label_values(&[monitor]).dec();
}

/// Gather all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if metrics encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation_success() {
        let resource_type = "TestResource";
        record_reconciliation_success(resource_type, Duration::from_millis(500));

        let counter = RECONCILIATION_TOTAL.with_label_values(&[resource_type, "success"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&[resource_type]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_reconciliation_error() {
        let resource_type = "TestResourceError";
        record_reconciliation_error(resource_type, Duration::from_millis(250));

        let counter = RECONCILIATION_TOTAL.with_label_values(&[resource_type, "error"]);
        assert!(counter.get() > 0.0);
    }

    #[test]
    fn test_monitor_gauge_tracks_running_monitors() {
        record_monitor_started("gauge-test");
        record_monitor_started("gauge-test");
        record_monitor_stopped("gauge-test");

        let gauge = MONITORS_ACTIVE.with_label_values(&["gauge-test"]);
        assert!((gauge.get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation_success("GatherTest", Duration::from_millis(100));
        record_notification("GatherTest");

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("starlingx_windriver_com"));
        assert!(metrics_text.contains("reconciliations_total"));
        assert!(metrics_text.contains("notifications_total"));
    }
}
