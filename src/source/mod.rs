// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Source store integration.
//!
//! Defines what the engine needs from a revisioned key-value store with a
//! change feed. The caller owns the client (endpoints, auth, TLS) and hands
//! the engine an implementation of [`ChangeSource`].
//!
//! # Channels
//!
//! Both operations return immediately with channels that the source fills
//! asynchronously:
//!
//! ```text
//! snapshot()  ──► batches: RecordBatch, RecordBatch, ..., RecordBatch{more: false}
//!             └─► errors:  SourceError (at most one, then closed)
//!
//! watch(rev)  ──► Ok(EventBatch), Ok(EventBatch), ..., [Err(SourceError)]
//!                 closed when the stream ends or shutdown fires
//! ```

mod memory;

pub use memory::MemorySource;

use crate::event::{EventBatch, RecordBatch};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Failures reported by the source store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The requested start revision was compacted away.
    #[error("revision {requested} has been compacted (compacted through {compacted})")]
    Compacted { requested: i64, compacted: i64 },

    /// The watcher fell too far behind and events were dropped.
    #[error("watch lagged, {skipped} events dropped")]
    Lagged { skipped: u64 },

    /// The snapshot data channel closed before the final batch.
    #[error("snapshot ended before its final batch")]
    Truncated,

    /// Snapshot batches disagreed on the consistency point.
    #[error("snapshot revision changed from {expected} to {actual}")]
    InconsistentSnapshot { expected: i64, actual: i64 },

    /// The source could not be reached or failed the request.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Check if restarting the engine could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // A restart takes a fresh snapshot, so the old revision no longer matters
            SourceError::Compacted { .. } => true,
            SourceError::Lagged { .. } => true,
            SourceError::Truncated => true,
            SourceError::InconsistentSnapshot { .. } => false,
            SourceError::Unavailable(_) => true,
        }
    }
}

/// Channels delivering one snapshot.
pub struct Snapshot {
    /// Snapshot chunks, all at the same revision. The last one has `more == false`.
    pub batches: mpsc::Receiver<RecordBatch>,
    /// Terminal error, if the snapshot fails.
    pub errors: mpsc::Receiver<SourceError>,
}

impl Snapshot {
    /// Create a snapshot with sender halves for the producer.
    pub fn channel(capacity: usize) -> (SnapshotSender, Snapshot) {
        let (batch_tx, batches) = mpsc::channel(capacity.max(1));
        let (error_tx, errors) = mpsc::channel(1);
        (
            SnapshotSender {
                batches: batch_tx,
                errors: error_tx,
            },
            Snapshot { batches, errors },
        )
    }
}

/// Producer half of a [`Snapshot`].
#[derive(Clone)]
pub struct SnapshotSender {
    pub batches: mpsc::Sender<RecordBatch>,
    pub errors: mpsc::Sender<SourceError>,
}

/// Receiver of the change stream.
pub type WatchReceiver = mpsc::Receiver<Result<EventBatch, SourceError>>;

/// What the engine needs from the source store.
///
/// Implementations must deliver events in commit order and close the watch
/// channel when `shutdown` becomes `true`.
pub trait ChangeSource: Send + Sync + 'static {
    /// Start a snapshot of the current key space.
    fn snapshot(&self, shutdown: watch::Receiver<bool>) -> Snapshot;

    /// Stream mutations with revision `>= start_revision`.
    fn watch(&self, start_revision: i64, shutdown: watch::Receiver<bool>) -> WatchReceiver;
}
