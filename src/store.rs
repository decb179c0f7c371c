//! # Event Store
//! Holds the most recently published [`Snapshot`] for concurrent readers.
//!
//! The poll loop builds a complete snapshot off-lock and hands it to
//! [`EventStore::replace`]; readers call [`EventStore::read`] at any time.
//! Both critical sections only clone or swap an `Arc`, so readers always see
//! one whole snapshot and never block on network work.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::types::Event;

/// Per-source event lists from one poll cycle, sorted by `time` ascending.
///
/// A source missing from `groups` failed to fetch this cycle. A source that
/// has no upcoming events maps to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    groups: BTreeMap<String, Vec<Event>>,
}

impl Snapshot {
    pub fn new(groups: BTreeMap<String, Vec<Event>>, taken_at: DateTime<Utc>) -> Self {
        Self { taken_at, groups }
    }

    pub fn groups(&self) -> &BTreeMap<String, Vec<Event>> {
        &self.groups
    }

    pub fn get(&self, source: &str) -> Option<&[Event]> {
        self.groups.get(source).map(Vec::as_slice)
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<Arc<Snapshot>>,
    generation: u64,
}

/// Thread-safe holder of exactly one live snapshot.
#[derive(Debug, Default)]
pub struct EventStore {
    inner: Mutex<Inner>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded value is always a whole `Arc`, so a poisoned lock still
    // holds a consistent snapshot.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `snapshot` as current, dropping our reference to the old one.
    pub fn replace(&self, snapshot: Snapshot) {
        let fresh = Arc::new(snapshot);
        let previous = {
            let mut inner = self.lock();
            inner.generation = inner.generation.saturating_add(1);
            inner.current.replace(fresh)
        };
        // Old snapshot is freed outside the lock when the last reader lets go.
        drop(previous);
    }

    /// Current snapshot, or `None` before the first publish.
    pub fn read(&self) -> Option<Arc<Snapshot>> {
        self.lock().current.clone()
    }

    /// Like [`read`](Self::read) but with the snapshot's generation
    /// (0 before the first publish).
    pub fn read_with_generation(&self) -> (Option<Arc<Snapshot>>, u64) {
        let inner = self.lock();
        (inner.current.clone(), inner.generation)
    }

    /// All groups' events; an empty snapshot before the first publish.
    pub fn all_events(&self) -> Arc<Snapshot> {
        self.read().unwrap_or_default()
    }

    /// Number of snapshots installed so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}
