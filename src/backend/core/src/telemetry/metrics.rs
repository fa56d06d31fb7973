//! Prometheus metrics for authorization decisions and session termination.
//!
//! # Example
//!
//! ```rust,no_run
//! use access_core::telemetry::metrics::AccessMetrics;
//!
//! AccessMetrics::permission_check("workspace:read", true);
//! AccessMetrics::logout("jwt", "success");
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use crate::config::ObservabilityConfig;

/// Handle to the installed recorder; `None` when metrics are disabled.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
}

/// Initialize the metrics subsystem.
///
/// Installs a Prometheus recorder; the host process exposes
/// [`MetricsRegistry::render`] on its own scrape endpoint.
pub fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<MetricsRegistry> {
    if !config.metrics_enabled {
        return Ok(MetricsRegistry {
            prometheus_handle: None,
        });
    }

    let builder = PrometheusBuilder::new()
        .add_global_label("service", "access-core")
        .set_buckets(&default_duration_buckets())?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!("Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!("access_errors_total", "Errors constructed, by code and category");

    describe_counter!("access_permission_checks_total", "Permission checks by outcome");
    describe_histogram!(
        "access_permission_check_duration_seconds",
        "Permission resolution latency including store round trips"
    );
    describe_counter!("access_role_mutations_total", "Role assignment and grant changes");

    describe_counter!("access_logouts_total", "Logout attempts by method and outcome");
    describe_counter!("access_blacklist_operations_total", "Token blacklist operations");
    describe_counter!("access_blacklist_swept_total", "Expired blacklist entries removed by sweeps");
    describe_counter!(
        "access_oidc_logout_url_failures_total",
        "OIDC logouts that degraded to back-channel only"
    );

    describe_counter!("access_audit_events_total", "Audit entries appended");
    describe_counter!(
        "access_audit_write_failures_total",
        "Audit entries that could not be persisted"
    );
}

/// Typed helpers so metric names and labels stay consistent across modules.
pub struct AccessMetrics;

impl AccessMetrics {
    pub fn permission_check(permission: &str, allowed: bool) {
        counter!(
            "access_permission_checks_total",
            "permission" => permission.to_string(),
            "outcome" => if allowed { "allow" } else { "deny" },
        )
        .increment(1);
    }

    pub fn role_mutation(operation: &'static str, outcome: &'static str) {
        counter!(
            "access_role_mutations_total",
            "operation" => operation,
            "outcome" => outcome,
        )
        .increment(1);
    }

    pub fn logout(method: &'static str, outcome: &'static str) {
        counter!(
            "access_logouts_total",
            "method" => method,
            "outcome" => outcome,
        )
        .increment(1);
    }

    pub fn blacklist_operation(operation: &'static str, outcome: &'static str) {
        counter!(
            "access_blacklist_operations_total",
            "operation" => operation,
            "outcome" => outcome,
        )
        .increment(1);
    }

    pub fn blacklist_swept(count: u64) {
        counter!("access_blacklist_swept_total").increment(count);
    }

    pub fn oidc_logout_url_failure(provider: &str) {
        counter!(
            "access_oidc_logout_url_failures_total",
            "provider" => provider.to_string(),
        )
        .increment(1);
    }

    pub fn audit_event(action: &str) {
        counter!("access_audit_events_total", "action" => action.to_string()).increment(1);
    }

    pub fn audit_write_failure() {
        counter!("access_audit_write_failures_total").increment(1);
    }

    /// Start timing a permission resolution; the duration is recorded on drop.
    pub fn time_permission_check() -> CheckTimer {
        CheckTimer {
            start: Instant::now(),
        }
    }
}

/// Guard that records permission check latency when dropped.
pub struct CheckTimer {
    start: Instant,
}

impl Drop for CheckTimer {
    fn drop(&mut self) {
        histogram!("access_permission_check_duration_seconds")
            .record(self.start.elapsed().as_secs_f64());
    }
}
