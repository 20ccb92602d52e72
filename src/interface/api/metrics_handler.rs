//! Prometheus metrics exporter

use axum::extract::State;
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and describe the exported series
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "dialdesk_calls_initiated_total",
        "Calls registered by the orchestrator"
    );
    describe_counter!(
        "dialdesk_calls_ended_total",
        "Calls that reached a terminal state or were ended"
    );
    describe_gauge!("dialdesk_active_calls", "Sessions currently in the registry");
    describe_gauge!("dialdesk_connected_agents", "Agent channels currently connected");

    Ok(handle)
}

pub fn update_active_calls(count: usize) {
    gauge!("dialdesk_active_calls").set(count as f64);
}

pub fn update_connected_agents(count: usize) {
    gauge!("dialdesk_connected_agents").set(count as f64);
}

/// GET /metrics
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
