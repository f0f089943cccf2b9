//! Scripted ChangeSource for testing.
//!
//! Plays back a fixed snapshot and change stream so tests can drive exact
//! interleavings: errors before data, stalls, truncation, replays.

use kv2sql::event::{EventBatch, MutationEvent, Record, RecordBatch};
use kv2sql::source::{ChangeSource, Snapshot, SourceError, WatchReceiver};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

/// How the snapshot behaves.
#[derive(Debug, Clone)]
pub enum SnapshotScript {
    /// Send these batches, then close.
    Batches(Vec<RecordBatch>),
    /// Send this error and no data.
    ErrorFirst(SourceError),
    /// Send nothing until shutdown.
    Stall,
}

/// A ChangeSource that replays a script.
pub struct ScriptedSource {
    snapshot: SnapshotScript,
    changes: Vec<Result<EventBatch, SourceError>>,
    /// Keep the change stream open until shutdown
    hold_open: bool,
    /// Start revision of every watch() call
    watch_calls: Mutex<Vec<i64>>,
}

impl ScriptedSource {
    /// Source whose snapshot is the given batches.
    pub fn with_snapshot(batches: Vec<RecordBatch>) -> Self {
        Self {
            snapshot: SnapshotScript::Batches(batches),
            changes: Vec::new(),
            hold_open: false,
            watch_calls: Mutex::new(Vec::new()),
        }
    }

    /// Source whose snapshot is one complete batch of `records` at `revision`.
    pub fn with_records(revision: i64, records: Vec<Record>) -> Self {
        Self::with_snapshot(vec![RecordBatch::complete(revision, records)])
    }

    /// Source whose snapshot fails before any data.
    pub fn failing_snapshot(err: SourceError) -> Self {
        Self {
            snapshot: SnapshotScript::ErrorFirst(err),
            ..Self::with_snapshot(Vec::new())
        }
    }

    /// Source whose snapshot never answers.
    pub fn stalled_snapshot() -> Self {
        Self {
            snapshot: SnapshotScript::Stall,
            ..Self::with_snapshot(Vec::new())
        }
    }

    /// Units the change stream delivers, in order.
    pub fn then_changes(mut self, changes: Vec<Result<EventBatch, SourceError>>) -> Self {
        self.changes = changes;
        self
    }

    /// Event batches the change stream delivers, in order.
    pub fn then_events(self, batches: Vec<Vec<MutationEvent>>) -> Self {
        self.then_changes(batches.into_iter().map(|events| Ok(EventBatch::new(events))).collect())
    }

    /// Keep the change stream open after the script until shutdown.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Start revisions requested from watch().
    pub fn watch_calls(&self) -> Vec<i64> {
        self.watch_calls.lock().unwrap().clone()
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|signalled| *signalled).await;
}

impl ChangeSource for ScriptedSource {
    fn snapshot(&self, shutdown: watch::Receiver<bool>) -> Snapshot {
        let (tx, snapshot) = Snapshot::channel(16);
        let script = self.snapshot.clone();

        tokio::spawn(async move {
            match script {
                SnapshotScript::Batches(batches) => {
                    for batch in batches {
                        if tx.batches.send(batch).await.is_err() {
                            return;
                        }
                    }
                }
                SnapshotScript::ErrorFirst(err) => {
                    let _ = tx.errors.send(err).await;
                }
                SnapshotScript::Stall => {
                    // Holding `tx` keeps both channels open
                    wait_for_shutdown(shutdown).await;
                    drop(tx);
                }
            }
        });

        snapshot
    }

    fn watch(&self, start_revision: i64, shutdown: watch::Receiver<bool>) -> WatchReceiver {
        self.watch_calls.lock().unwrap().push(start_revision);

        let (tx, rx) = mpsc::channel(16);
        let changes = self.changes.clone();
        let hold_open = self.hold_open;

        tokio::spawn(async move {
            for unit in changes {
                if tx.send(unit).await.is_err() {
                    return;
                }
            }
            if hold_open {
                wait_for_shutdown(shutdown).await;
            }
            drop(tx);
        });

        rx
    }
}
