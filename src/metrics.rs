use anyhow::Context;
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::PollConfig;

pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize Prometheus recorder and expose static gauges for the poll settings.
    pub fn init(cfg: &PollConfig) -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        crate::ingest::ensure_metrics_described();
        gauge!("meetup_poll_interval_secs").set(cfg.interval.as_secs_f64());
        gauge!("meetup_fetch_timeout_secs").set(cfg.fetch_timeout.as_secs_f64());

        Ok(Self { handle })
    }

    /// `METRICS_ENABLED=1` turns the recorder and `/metrics` on.
    pub fn enabled_from_env() -> bool {
        std::env::var(ENV_METRICS_ENABLED).ok().as_deref() == Some("1")
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
