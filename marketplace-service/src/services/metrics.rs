use crate::models::EntitlementStatus;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<(), anyhow::Error> {
    let handle = service_core::observability::init_metrics_recorder()?;
    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count an entitlement reaching `to`.
pub fn record_entitlement_transition(to: EntitlementStatus) {
    metrics::counter!("entitlement_transitions_total", "to" => to.as_str()).increment(1);
}

/// Count a listing attempt refused by the authorization gate.
pub fn record_gate_rejection(reason: &'static str) {
    metrics::counter!("listing_gate_rejections_total", "reason" => reason).increment(1);
}
