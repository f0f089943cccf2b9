// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process revisioned key-value store.
//!
//! Implements [`ChangeSource`] for standalone runs and tests. Behaves like
//! the real source store where the engine can observe it:
//!
//! - every commit bumps the revision once, however many keys it touches
//! - deleting an absent key is not a commit
//! - watches replay retained history, then follow live commits
//! - compacted revisions cannot be watched from
//!
//! History grows by one batch per commit and is only released by
//! [`MemorySource::compact`]. A long-running store should either compact
//! as it goes or set a retention window with
//! [`MemorySource::with_history_limit`], which compacts on every commit.
//!
//! Snapshots and watches spawn tasks, so they must be called from within a
//! Tokio runtime.

use super::{ChangeSource, Snapshot, SourceError, WatchReceiver};
use crate::coordinator::shutdown_signalled;
use crate::event::{EventBatch, MutationEvent, Record, RecordBatch};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

/// Records per snapshot batch unless configured otherwise.
const DEFAULT_PAGE_SIZE: usize = 500;

/// Capacity of the snapshot and watch channels handed to the engine.
const CHANNEL_CAPACITY: usize = 64;

/// Commits buffered per live watcher before it is reported as lagged.
const LIVE_BUFFER: usize = 1024;

struct StoredValue {
    value: Vec<u8>,
    mod_revision: i64,
}

struct Inner {
    revision: i64,
    compacted: i64,
    kvs: BTreeMap<Vec<u8>, StoredValue>,
    /// One batch per commit, oldest first.
    history: Vec<EventBatch>,
    /// `None` once closed.
    live: Option<broadcast::Sender<EventBatch>>,
    /// Revisions kept watchable behind the head, if bounded.
    history_limit: Option<i64>,
}

impl Inner {
    /// Drop history through `revision`. Returns whether the floor moved.
    fn compact_through(&mut self, revision: i64) -> bool {
        let revision = revision.min(self.revision);
        if revision <= self.compacted {
            return false;
        }
        self.compacted = revision;
        self.history.retain(|batch| batch_revision(batch).is_some_and(|rev| rev > revision));
        true
    }
}

/// Revisioned in-memory store with snapshot and watch support.
pub struct MemorySource {
    inner: Mutex<Inner>,
    page_size: usize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store whose snapshots are split into batches of `page_size`.
    pub fn with_page_size(page_size: usize) -> Self {
        let (live, _) = broadcast::channel(LIVE_BUFFER);
        Self {
            inner: Mutex::new(Inner {
                revision: 0,
                compacted: 0,
                kvs: BTreeMap::new(),
                history: Vec::new(),
                live: Some(live),
                history_limit: None,
            }),
            page_size: page_size.max(1),
        }
    }

    /// Keep only the last `revisions` commits watchable. Older history is
    /// compacted as new commits land.
    pub fn with_history_limit(self, revisions: usize) -> Self {
        let limit = i64::try_from(revisions.max(1)).unwrap_or(i64::MAX);
        self.lock().history_limit = Some(limit);
        self
    }

    /// Commits currently retained for watch replay.
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current revision (0 before the first commit).
    pub fn revision(&self) -> i64 {
        self.lock().revision
    }

    /// Highest compacted revision.
    pub fn compacted_revision(&self) -> i64 {
        self.lock().compacted
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.lock().kvs.get(key).map(|stored| stored.value.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().kvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().kvs.is_empty()
    }

    /// Write one key. Returns the commit revision.
    pub fn put(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> i64 {
        self.put_all(vec![(key.into(), value.into())])
    }

    /// Write several keys in one commit (one shared revision).
    pub fn put_all(&self, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> i64 {
        let mut inner = self.lock();
        if pairs.is_empty() {
            return inner.revision;
        }
        let revision = inner.revision + 1;
        let mut events = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            inner.kvs.insert(
                key.clone(),
                StoredValue {
                    value: value.clone(),
                    mod_revision: revision,
                },
            );
            events.push(MutationEvent::Put {
                key,
                value,
                revision,
            });
        }
        Self::commit(&mut inner, revision, events);
        revision
    }

    /// Delete one key. Returns `None` without committing if it was absent.
    pub fn delete(&self, key: &[u8]) -> Option<i64> {
        let mut inner = self.lock();
        let previous = inner.kvs.remove(key)?;
        let revision = inner.revision + 1;
        let event = MutationEvent::Delete {
            key: key.to_vec(),
            revision,
            prev_value: Some(previous.value),
        };
        Self::commit(&mut inner, revision, vec![event]);
        Some(revision)
    }

    fn commit(inner: &mut Inner, revision: i64, events: Vec<MutationEvent>) {
        inner.revision = revision;
        let batch = EventBatch::new(events);
        if let Some(live) = &inner.live {
            // No receivers is fine: nobody is watching yet
            let _ = live.send(batch.clone());
        }
        inner.history.push(batch);
        if let Some(limit) = inner.history_limit {
            inner.compact_through(revision - limit);
        }
    }

    /// Discard history through `revision`. Watches can no longer start at or
    /// below it.
    pub fn compact(&self, revision: i64) {
        let mut inner = self.lock();
        if inner.compact_through(revision) {
            debug!(compacted = inner.compacted, "Compacted history");
        }
    }

    /// End every live watch once its backlog is delivered.
    pub fn close(&self) {
        self.lock().live = None;
    }
}

fn batch_revision(batch: &EventBatch) -> Option<i64> {
    batch.events.first().map(MutationEvent::revision)
}

/// Send one item unless shutdown fires first. Returns `false` when the
/// producer should stop.
async fn forward<T>(
    tx: &mpsc::Sender<T>,
    shutdown: &mut watch::Receiver<bool>,
    item: T,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_signalled(shutdown) => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

impl ChangeSource for MemorySource {
    fn snapshot(&self, mut shutdown: watch::Receiver<bool>) -> Snapshot {
        let (tx, snapshot) = Snapshot::channel(CHANNEL_CAPACITY);

        let (revision, records) = {
            let inner = self.lock();
            let records: Vec<Record> = inner
                .kvs
                .iter()
                .map(|(key, stored)| {
                    Record::new(key.clone(), stored.value.clone(), stored.mod_revision)
                })
                .collect();
            (inner.revision, records)
        };
        let page_size = self.page_size;

        tokio::spawn(async move {
            let mut pages: Vec<Vec<Record>> =
                records.chunks(page_size).map(<[Record]>::to_vec).collect();
            if pages.is_empty() {
                pages.push(Vec::new());
            }
            let last = pages.len() - 1;

            for (index, records) in pages.into_iter().enumerate() {
                let batch = RecordBatch {
                    revision,
                    records,
                    more: index < last,
                };
                if !forward(&tx.batches, &mut shutdown, batch).await {
                    debug!(revision, "Snapshot producer stopped early");
                    return;
                }
            }
        });

        snapshot
    }

    fn watch(&self, start_revision: i64, mut shutdown: watch::Receiver<bool>) -> WatchReceiver {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        // Backlog and subscription are taken under one lock: no gap, no overlap
        let (compacted, backlog, live) = {
            let inner = self.lock();
            if start_revision <= inner.compacted {
                (Some(inner.compacted), Vec::new(), None)
            } else {
                let backlog: Vec<EventBatch> = inner
                    .history
                    .iter()
                    .filter(|batch| batch_revision(batch).is_some_and(|rev| rev >= start_revision))
                    .cloned()
                    .collect();
                let live = inner.live.as_ref().map(broadcast::Sender::subscribe);
                (None, backlog, live)
            }
        };

        tokio::spawn(async move {
            if let Some(compacted) = compacted {
                let err = SourceError::Compacted {
                    requested: start_revision,
                    compacted,
                };
                let _ = tx.send(Err(err)).await;
                return;
            }

            for batch in backlog {
                if !forward(&tx, &mut shutdown, Ok(batch)).await {
                    return;
                }
            }

            let Some(mut live) = live else {
                return;
            };

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_signalled(&mut shutdown) => return,
                    received = live.recv() => match received {
                        Ok(batch) => {
                            if batch_revision(&batch).is_some_and(|rev| rev < start_revision) {
                                continue;
                            }
                            if !forward(&tx, &mut shutdown, Ok(batch)).await {
                                return;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Memory source watcher lagged");
                            let _ = tx.send(Err(SourceError::Lagged { skipped })).await;
                            return;
                        }
                        Err(RecvError::Closed) => return,
                    },
                }
            }
        });

        rx
    }
}
