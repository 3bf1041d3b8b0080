use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register help text for every series the crate emits. Safe to call repeatedly.
pub fn ensure_metrics_described() {
    DESCRIBED.get_or_init(|| {
        describe_counter!(
            "radar_fetch_retries_total",
            "HTTP 429 responses that were retried after a backoff"
        );
        describe_counter!("radar_cache_hits_total", "Report cache hits");
        describe_counter!(
            "radar_cache_misses_total",
            "Report cache misses, including expired and unreadable entries"
        );
        describe_counter!("radar_runs_total", "Finished runs by outcome");
        describe_histogram!("radar_run_ms", Unit::Milliseconds, "Run wall time");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured cache TTL.
    /// Fails if a global recorder is already installed.
    pub fn init(cache_ttl_ms: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        ensure_metrics_described();
        // absolute TTL, no sliding refresh
        gauge!("radar_cache_ttl_ms").set(cache_ttl_ms as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
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
