// src/lib.rs
// Public library surface for integration tests (and the shuttle binary).

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod render;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::PollConfig;
pub use crate::ingest::scheduler::{PollHandle, PollState};
pub use crate::ingest::types::{Event, EventProvider, FetchError};
pub use crate::store::{EventStore, Snapshot};

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::axum::Router;
use tracing::info;

use crate::ingest::providers::meetup::MeetupProvider;

/// A running service: router for readers, store, and the background poller.
pub struct App {
    pub router: Router,
    pub store: Arc<EventStore>,
    pub poller: PollHandle,
}

/// Start polling `sources` through `provider` and build the router over the
/// shared store. Must be called inside a Tokio runtime.
pub fn launch(provider: Arc<dyn EventProvider>, sources: Vec<String>, cfg: &PollConfig) -> App {
    let store = Arc::new(EventStore::new());
    let poller = ingest::scheduler::spawn_poll_loop(provider, sources, Arc::clone(&store), cfg);
    let router = create_router(AppState::new(Arc::clone(&store)));
    App {
        router,
        store,
        poller,
    }
}

/// Build the production service from the environment:
/// `PollConfig::from_env`, the configured source list, the Meetup HTTP
/// fetcher and (with `METRICS_ENABLED=1`) the `/metrics` route.
pub fn launch_from_env() -> anyhow::Result<App> {
    let cfg = PollConfig::from_env();
    let sources = ingest::config::load_sources_default().context("loading meetup sources")?;
    let provider = MeetupProvider::from_url(&cfg.api_base, cfg.fetch_timeout)
        .context("building meetup http fetcher")?;

    info!(
        sources = ?sources,
        interval_secs = cfg.interval.as_secs(),
        api_base = %cfg.api_base,
        "starting meetup poller"
    );

    // Recorder goes in before the first cycle so its counters are kept.
    let metrics = if crate::metrics::Metrics::enabled_from_env() {
        Some(crate::metrics::Metrics::init(&cfg)?)
    } else {
        None
    };

    let mut app = launch(Arc::new(provider), sources, &cfg);
    if let Some(m) = metrics {
        app.router = app.router.merge(m.router());
    }
    Ok(app)
}
