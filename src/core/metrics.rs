use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    if PROM_HANDLE.set(handle).is_ok() {
        describe();
    }
    Ok(())
}

fn describe() {
    describe_counter!("sessions_expired_total", "Sessions moved to TIMED_OUT");
    describe_counter!("results_graded_total", "Results persisted by the grading engine");
    describe_counter!("grading_failures_total", "Expired sessions whose grading failed");
    describe_counter!(
        "collaborator_fallbacks_total",
        "Grading lookups that fell back to a degraded default"
    );
    describe_counter!("cascade_step_failures_total", "Cascade delete steps that failed");
    describe_counter!("sweep_runs_total", "Completed expiration sweeps");
    describe_counter!("http_requests_total", "HTTP responses by status");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency by status"
    );
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
