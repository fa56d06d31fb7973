//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: JSON/pretty logging with credential redaction
//! - **Metrics**: counters for permission checks, logouts, blacklist and audit writes
//!
//! # Example
//!
//! ```rust,no_run
//! use access_core::config::ObservabilityConfig;
//! use access_core::telemetry::init_telemetry;
//!
//! let config = ObservabilityConfig::default();
//! let _handle = init_telemetry(&config, "production").expect("telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, RedactionConfig, SensitiveFieldRedactor};
pub use metrics::{init_metrics, AccessMetrics, MetricsRegistry};

use crate::config::ObservabilityConfig;

/// Initialize logging and metrics. Call once at process start.
pub fn init_telemetry(config: &ObservabilityConfig, environment: &str) -> anyhow::Result<MetricsRegistry> {
    let registry = init_metrics(config)?;
    init_logging(&LoggingConfig::from(config), environment)?;
    Ok(registry)
}
