use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Must run before anything records
    /// a series, or those records go to the no-op recorder.
    pub fn init(scrape_interval_secs: u64) -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .map_err(|err| anyhow::anyhow!("prometheus: install recorder: {err}"))?;

        describe_gauge!(
            "live_subscribers",
            "Currently connected WebSocket subscribers."
        );
        describe_gauge!(
            "scrape_interval_secs",
            "Configured scheduler interval in seconds."
        );
        gauge!("scrape_interval_secs").set(scrape_interval_secs as f64);

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
