use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Only one recorder may exist
    /// per process; a second call fails.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
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

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register help text for every metric the crate emits. Idempotent.
pub fn describe_all() {
    DESCRIBED.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Feed requests issued, by region.");
        describe_counter!("feed_fetch_errors_total", "Feed requests that failed, by region.");
        describe_counter!("feed_events_parsed_total", "Items decoded from feed documents.");
        describe_histogram!("feed_parse_ms", Unit::Milliseconds, "Time to decode one feed document.");
        describe_counter!("collector_forwarded_total", "Items handed from region workers to dispatch.");
        describe_counter!("collector_delivered_total", "Items delivered to subscribers.");
        describe_gauge!("collector_subscribers", "Registered subscribers.");
        describe_counter!("reconcile_passes_total", "Reconciliation passes started.");
        describe_counter!("reconcile_errors_total", "Reconciliation passes that failed.");
        describe_counter!("reconcile_written_total", "Event revisions written by reconciliation.");
        describe_gauge!("reconcile_last_run_ts", Unit::Seconds, "Unix time of the last successful pass.");
    });
}
