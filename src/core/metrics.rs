use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("ocr_requests_total", "Text extraction calls by outcome");
    metrics::describe_histogram!("ocr_request_duration_seconds", "Text extraction latency");
    metrics::describe_counter!("llm_requests_total", "Model completion calls by outcome");
    metrics::describe_histogram!("llm_request_duration_seconds", "Model completion latency");
    metrics::describe_counter!(
        "llm_rejected_reports_total",
        "Structured reports replaced with the error payload"
    );
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
