// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{Event, EventProvider};
use crate::store::Snapshot;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "meetup_fetch_events_total",
            "Total events decoded from the upstream API."
        );
        describe_counter!(
            "meetup_fetch_errors_total",
            "Per-source fetch/decode failures, labelled by kind."
        );
        describe_histogram!(
            "meetup_fetch_duration_ms",
            "Upstream fetch time in milliseconds."
        );
        describe_counter!("meetup_poll_cycles_total", "Completed poll cycles.");
        describe_gauge!(
            "meetup_poll_last_run_ts",
            "Unix ts when the poll loop last published a snapshot."
        );
        describe_gauge!(
            "meetup_snapshot_sources",
            "Sources present in the current snapshot."
        );
    });
}

/// Stable ascending sort by occurrence time; equal times keep fetch order.
pub fn sort_chronologically(events: &mut [Event]) {
    events.sort_by_key(|e| e.time);
}

/// Fetch every source concurrently and build one complete snapshot.
///
/// A failing source is logged and left out of the snapshot; it never affects
/// the other sources. Duplicate source ids are fetched once.
pub async fn aggregate(provider: Arc<dyn EventProvider>, sources: &[String]) -> Snapshot {
    ensure_metrics_described();

    let mut seen = HashSet::new();
    let mut tasks = JoinSet::new();
    let mut task_sources = HashMap::new();
    for source in sources {
        if !seen.insert(source.as_str()) {
            continue;
        }
        let provider = Arc::clone(&provider);
        let handle = {
            let source = source.clone();
            tasks.spawn(async move {
                let res = provider.fetch_events(&source).await;
                (source, res)
            })
        };
        task_sources.insert(handle.id(), source.clone());
    }

    let mut groups = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((source, Ok(mut events))) => {
                sort_chronologically(&mut events);
                tracing::debug!(source = %source, events = events.len(), "fetched events");
                groups.insert(source, events);
            }
            Ok((source, Err(e))) => {
                tracing::warn!(source = %source, error = %e, provider = provider.name(), "error fetching events");
                counter!("meetup_fetch_errors_total", "kind" => e.kind()).increment(1);
            }
            Err(e) => {
                let source = task_sources
                    .get(&e.id())
                    .map(String::as_str)
                    .unwrap_or("<unknown>");
                tracing::error!(source = %source, error = %e, provider = provider.name(), "fetch task aborted");
                counter!("meetup_fetch_errors_total", "kind" => "task").increment(1);
            }
        }
    }

    Snapshot::new(groups, chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ev(id: &str, time: i64) -> Event {
        Event {
            id: id.into(),
            name: format!("event {id}"),
            time,
        }
    }

    struct Canned {
        ok: HashMap<String, Vec<Event>>,
        panics_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventProvider for Canned {
        async fn fetch_events(&self, source: &str) -> Result<Vec<Event>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panics_on.is_some_and(|p| p == source) {
                panic!("provider blew up on {source}");
            }
            self.ok
                .get(source)
                .cloned()
                .ok_or_else(|| FetchError::UnknownSource(source.to_string()))
        }
        fn name(&self) -> &'static str {
            "canned"
        }
    }

    fn canned(pairs: Vec<(&str, Vec<Event>)>) -> Arc<Canned> {
        Arc::new(Canned {
            ok: pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            panics_on: None,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn sort_is_stable_for_equal_times() {
        let mut v = vec![ev("a", 5), ev("b", 1), ev("c", 5), ev("d", 1)];
        sort_chronologically(&mut v);
        let ids: Vec<_> = v.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn failed_source_is_absent_and_others_sorted() {
        let p = canned(vec![("A", vec![ev("1", 300), ev("2", 100)])]);
        let snap = aggregate(p, &["A".into(), "B".into()]).await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("A").unwrap(), &[ev("2", 100), ev("1", 300)]);
        assert!(snap.get("B").is_none());
    }

    #[tokio::test]
    async fn empty_success_is_kept_as_empty_list() {
        let p = canned(vec![("A", vec![])]);
        let snap = aggregate(p, &["A".into()]).await;
        assert_eq!(snap.get("A"), Some(&[][..]));
    }

    #[tokio::test]
    async fn duplicate_sources_fetched_once() {
        let p = canned(vec![("A", vec![ev("1", 1)])]);
        let snap = aggregate(p.clone(), &["A".into(), "A".into()]).await;
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
        assert_eq!(snap.len(), 1);
    }

    #[tokio::test]
    async fn panicking_fetch_omits_only_that_source() {
        let p = Arc::new(Canned {
            ok: [
                ("A".to_string(), vec![ev("1", 20), ev("2", 10)]),
                ("B".to_string(), vec![ev("3", 5)]),
            ]
            .into_iter()
            .collect(),
            panics_on: Some("boom"),
            calls: AtomicUsize::new(0),
        });
        let snap = aggregate(p, &["A".into(), "boom".into(), "B".into()]).await;
        assert_eq!(snap.len(), 2);
        assert!(snap.get("boom").is_none());
        assert_eq!(snap.get("A").unwrap(), &[ev("2", 10), ev("1", 20)]);
        assert_eq!(snap.get("B").unwrap(), &[ev("3", 5)]);
    }

    #[tokio::test]
    async fn all_failures_yield_empty_snapshot() {
        let p = canned(vec![]);
        let snap = aggregate(p, &["A".into(), "B".into()]).await;
        assert!(snap.is_empty());
    }
}
