//! Prometheus metrics for the watcher node.
//!
//! The watcher reports through [`MetricsSink`]; this sink forwards into the
//! global `metrics` recorder so `/metrics` can render it.

use aptwatch_watcher::MetricsSink;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub(crate) const OBSERVATIONS_CONFIRMED: &str = "aptwatch_observations_confirmed_total";
pub(crate) const CURRENT_HEIGHT: &str = "aptwatch_current_height";

/// Installs the Prometheus recorder and registers metric descriptions.
pub(crate) fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        OBSERVATIONS_CONFIRMED,
        "Total number of verified Aptos observations found"
    );
    describe_gauge!(CURRENT_HEIGHT, "Current Aptos block height");

    Ok(handle)
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn inc_observations_confirmed(&self) {
        counter!(OBSERVATIONS_CONFIRMED).increment(1);
    }

    fn set_current_height(&self, height: u64) {
        gauge!(CURRENT_HEIGHT).set(height as f64);
    }
}
