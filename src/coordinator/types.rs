//! Engine state types.
//!
//! Defines the state machine for one engine run.
//!
//! # State Transitions
//!
//! ```text
//!                 run()
//! Created ──────────────────→ Preparing
//!                                 │ (statements prepared)
//!                                 ↓
//!                            Snapshotting
//!                                 │ (final batch applied)
//!                                 ↓
//!                             Streaming ──────────→ Stopped
//!                                          (stream closed)
//!
//! any phase ──(shutdown / deadline)──→ Cancelled
//! any phase ──(prepare, source or write error)──→ Failed
//! ```
//!
//! A run is one-shot: every terminal state is final and a second `run()`
//! is rejected. Restarting means building a new engine, which re-snapshots.

/// State of the replication engine.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine created but not started.
    ///
    /// Call [`run()`](super::ReplicationEngine::run) to begin replication.
    Created,

    /// Preparing destination write statements. No source data read yet.
    Preparing,

    /// Loading the snapshot at the consistency point.
    Snapshotting,

    /// Applying the change stream that follows the consistency point.
    Streaming,

    /// The source closed the change stream.
    Stopped,

    /// Shutdown was signalled or the deadline passed.
    Cancelled,

    /// A prepare, source or write error ended the run.
    ///
    /// The error was returned from `run()`. The caller decides whether to
    /// start over with a fresh engine.
    Failed,
}

impl EngineState {
    /// Check if the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineState::Stopped | EngineState::Cancelled | EngineState::Failed
        )
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Preparing => write!(f, "Preparing"),
            EngineState::Snapshotting => write!(f, "Snapshotting"),
            EngineState::Streaming => write!(f, "Streaming"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Cancelled => write!(f, "Cancelled"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress of one run.
///
/// Filled in as the run advances, so it also describes how far a failed or
/// cancelled run got.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Source revision of the snapshot. `None` until the first batch arrives.
    pub consistency_point: Option<i64>,

    /// Snapshot records written.
    pub snapshot_records: u64,

    /// Snapshot batches received.
    pub snapshot_batches: u64,

    /// Stream events written to the destination.
    pub events_applied: u64,

    /// Stream events read but not written (replayed, or unmatched deletes).
    pub events_skipped: u64,

    /// Revision of the last stream event applied.
    pub last_revision: Option<i64>,
}

impl RunSummary {
    /// Rows the run wrote, snapshot and stream together.
    pub fn rows_written(&self) -> u64 {
        self.snapshot_records + self.events_applied
    }
}
