//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_auth_failures_total` (counter): rejections by `kind`
//! - `admission_decisions_total` (counter): engine decisions by `rule`,
//!   `mode`, `outcome`
//! - `admission_engine_faults_total` (counter)
//! - `admission_rate_limit_keys` (gauge): tracked sliding-window keys
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::protection::{OperatingMode, RuleKind};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_auth_failure(kind: &'static str) {
    counter!("admission_auth_failures_total", "kind" => kind).increment(1);
}

pub fn record_decision(rule: RuleKind, mode: OperatingMode, allowed: bool) {
    let outcome = if allowed { "allow" } else { "deny" };
    counter!(
        "admission_decisions_total",
        "rule" => rule.as_str(),
        "mode" => mode.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_engine_fault() {
    counter!("admission_engine_faults_total").increment(1);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("admission_rate_limit_keys").set(count as f64);
}
