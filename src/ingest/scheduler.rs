// src/ingest/scheduler.rs
use crate::config::PollConfig;
use crate::ingest::types::EventProvider;
use crate::store::EventStore;
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting out the interval.
    Idle,
    /// Aggregation in progress.
    Polling,
}

/// One poll cycle: aggregate all sources, then publish the snapshot.
/// Returns the number of sources in the published snapshot.
pub async fn run_cycle(
    provider: &Arc<dyn EventProvider>,
    sources: &[String],
    store: &EventStore,
) -> usize {
    let snapshot = crate::ingest::aggregate(Arc::clone(provider), sources).await;
    let published = snapshot.len();
    store.replace(snapshot);

    let now = chrono::Utc::now().timestamp().max(0) as f64;
    counter!("meetup_poll_cycles_total").increment(1);
    gauge!("meetup_poll_last_run_ts").set(now);
    gauge!("meetup_snapshot_sources").set(published as f64);
    published
}

/// Handle to the background poll loop.
///
/// Dropping the handle detaches the loop; it then runs for the lifetime of
/// the runtime.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<PollState>,
    cycles: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Number of cycles that finished and published a snapshot.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Stop the loop and wait for it to exit. An in-flight cycle is
    /// abandoned without publishing.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.shutdown.send_replace(true);
        self.task.await
    }
}

/// Spawn the poll loop: first cycle immediately, then one cycle per
/// `cfg.interval` measured from the end of the previous publish.
pub fn spawn_poll_loop(
    provider: Arc<dyn EventProvider>,
    sources: Vec<String>,
    store: Arc<EventStore>,
    cfg: &PollConfig,
) -> PollHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(PollState::Idle);
    let cycles = Arc::new(AtomicU64::new(0));
    let interval: Duration = cfg.interval;

    let task = {
        let cycles = Arc::clone(&cycles);
        tokio::spawn(async move {
            tracing::info!(
                target: "ingest",
                sources = sources.len(),
                interval_secs = interval.as_secs_f64(),
                "poll loop started"
            );
            loop {
                state_tx.send_replace(PollState::Polling);
                let published = tokio::select! {
                    n = run_cycle(&provider, &sources, &store) => n,
                    () = shutdown_requested(&mut shutdown_rx) => break,
                };
                state_tx.send_replace(PollState::Idle);
                let cycle = cycles.fetch_add(1, Ordering::AcqRel) + 1;

                tracing::info!(
                    target: "ingest",
                    cycle,
                    sources = sources.len(),
                    published,
                    "poll cycle published"
                );

                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = shutdown_requested(&mut shutdown_rx) => break,
                }
            }
            state_tx.send_replace(PollState::Idle);
            tracing::info!(target: "ingest", "poll loop stopped");
        })
    };

    PollHandle {
        shutdown: shutdown_tx,
        state: state_rx,
        cycles,
        task,
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped: nobody can ask us to stop any more.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Event, FetchError};
    use async_trait::async_trait;

    struct Counting {
        calls: AtomicU64,
    }

    #[async_trait]
    impl EventProvider for Counting {
        async fn fetch_events(&self, source: &str) -> Result<Vec<Event>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if source == "down" {
                return Err(FetchError::UnknownSource(source.into()));
            }
            Ok(vec![Event {
                id: format!("{source}-{n}"),
                name: "meetup".into(),
                time: 1_000,
            }])
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    // Never finishes inside a test window.
    struct Stalled;

    #[async_trait]
    impl EventProvider for Stalled {
        async fn fetch_events(&self, _source: &str) -> Result<Vec<Event>, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    async fn wait_for_cycles(h: &PollHandle, n: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while h.cycles() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poll loop did not complete cycles in time");
    }

    #[tokio::test]
    async fn run_cycle_publishes_successful_subset() {
        let provider: Arc<dyn EventProvider> = Arc::new(Counting {
            calls: AtomicU64::new(0),
        });
        let store = EventStore::new();
        let n = run_cycle(&provider, &["up".into(), "down".into()], &store).await;
        assert_eq!(n, 1);
        let snap = store.read().unwrap();
        assert!(snap.get("up").is_some());
        assert!(snap.get("down").is_none());
    }

    #[tokio::test]
    async fn first_cycle_runs_immediately_and_shutdown_stops_loop() {
        let provider: Arc<dyn EventProvider> = Arc::new(Counting {
            calls: AtomicU64::new(0),
        });
        let store = Arc::new(EventStore::new());
        // Long interval: only the immediate first cycle can run in the test window.
        let cfg = PollConfig::with_interval(Duration::from_secs(3600));
        let h = spawn_poll_loop(provider, vec!["up".into()], Arc::clone(&store), &cfg);

        wait_for_cycles(&h, 1).await;
        assert_eq!(store.generation(), 1);
        assert_eq!(h.state(), PollState::Idle);

        h.shutdown().await.unwrap();
        assert_eq!(store.generation(), 1);
    }

    #[tokio::test]
    async fn short_interval_keeps_republishing() {
        let provider: Arc<dyn EventProvider> = Arc::new(Counting {
            calls: AtomicU64::new(0),
        });
        let store = Arc::new(EventStore::new());
        let cfg = PollConfig::with_interval(Duration::from_millis(10));
        let h = spawn_poll_loop(provider, vec!["up".into()], Arc::clone(&store), &cfg);

        wait_for_cycles(&h, 3).await;
        assert!(store.generation() >= 3);
        let ids: Vec<_> = store
            .all_events()
            .get("up")
            .unwrap()
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(ids.len(), 1);

        h.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_mid_cycle_returns_promptly_without_publishing() {
        let provider: Arc<dyn EventProvider> = Arc::new(Stalled);
        let store = Arc::new(EventStore::new());
        let cfg = PollConfig::with_interval(Duration::from_secs(3600));
        let h = spawn_poll_loop(
            provider,
            vec!["a".into(), "b".into()],
            Arc::clone(&store),
            &cfg,
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.state() != PollState::Polling {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poll loop never entered Polling");

        tokio::time::timeout(Duration::from_secs(2), h.shutdown())
            .await
            .expect("shutdown blocked on the in-flight cycle")
            .unwrap();
        assert_eq!(store.generation(), 0);
        assert!(store.read().is_none());
    }
}
