// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::risk::AnalysisResult;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call at most once.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "analyze_requests_total",
            "Analyze requests by outcome (ok or error kind)."
        );
        describe_counter!("analyze_risk_level_total", "Successful analyses by risk level.");
        describe_histogram!("analyze_scoring_ms", "Model scoring time in milliseconds.");
    });
}

// Without an installed recorder these are no-ops, so tests need no setup.

pub fn record_result(result: &AnalysisResult) {
    counter!("analyze_requests_total", "outcome" => "ok").increment(1);
    counter!("analyze_risk_level_total", "level" => result.risk_level.as_str()).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("analyze_requests_total", "outcome" => kind).increment(1);
}

pub fn record_scoring_ms(ms: f64) {
    histogram!("analyze_scoring_ms").record(ms);
}
