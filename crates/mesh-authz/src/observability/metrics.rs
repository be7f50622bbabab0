//! Prometheus metrics for mesh-authz

use std::sync::OnceLock;

use metrics::{counter, describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;
use crate::policy::DecisionKind;
use crate::validator::OAuthErrorCode;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const METRIC_INFO: &str = "mesh_authz_info";
const METRIC_DECISIONS: &str = "mesh_authz_decisions_total";
const METRIC_KEY_FETCHES: &str = "mesh_authz_key_fetches_total";
const METRIC_VALIDATION_FAILURES: &str = "mesh_authz_validation_failures_total";
const METRIC_RECONCILE_EVENTS: &str = "mesh_authz_reconcile_events_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_counter!(METRIC_DECISIONS, "Policy decisions by kind");
    describe_counter!(METRIC_KEY_FETCHES, "JWKS fetches by outcome");
    describe_counter!(
        METRIC_VALIDATION_FAILURES,
        "Rejected bearer tokens by OAuth error code"
    );
    describe_counter!(
        METRIC_RECONCILE_EVENTS,
        "Reconciled records by kind and outcome"
    );

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a policy decision.
pub fn record_decision(kind: DecisionKind) {
    counter!(METRIC_DECISIONS, "kind" => kind.to_string()).increment(1);
}

/// Record a key set fetch.
pub fn record_key_fetch(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(METRIC_KEY_FETCHES, "outcome" => outcome).increment(1);
}

/// Record a rejected token.
pub fn record_validation_failure(code: OAuthErrorCode) {
    counter!(METRIC_VALIDATION_FAILURES, "code" => code.as_str()).increment(1);
}

/// Record a reconciled record event.
pub fn record_reconcile(kind: &str, outcome: &str) {
    counter!(
        METRIC_RECONCILE_EVENTS,
        "kind" => kind.to_owned(),
        "outcome" => outcome.to_owned(),
    )
    .increment(1);
}
