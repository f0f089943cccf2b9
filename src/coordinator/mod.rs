// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication engine coordinator.
//!
//! The orchestrator that ties together:
//! - The source change feed via [`crate::source::ChangeSource`]
//! - The destination via [`crate::sink::Sink`]
//! - Write-policy dispatch via [`crate::policy`]
//!
//! # Architecture
//!
//! One run is two strictly sequenced phases under one shutdown signal:
//! 1. Prepares the destination write statements (nothing read yet)
//! 2. Loads the snapshot at the consistency point (`snapshot` phase)
//! 3. Applies the change stream from `consistency_point + 1` (`changes` phase)
//!
//! Any error ends the run and is returned verbatim. The engine never retries
//! or reconnects; a caller that wants to continue builds a new engine, which
//! takes a fresh snapshot.

mod changes;
mod snapshot;
mod types;

pub use types::{EngineState, RunSummary};

use crate::config::EngineConfig;
use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::policy::WriteOp;
use crate::sink::Sink;
use crate::source::ChangeSource;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Wait until `shutdown` is set to `true`.
///
/// A dropped sender never signals: the future stays pending.
pub(crate) async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|signalled| *signalled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Destination writes for one phase, timed and counted per table.
struct Writer<'a, D> {
    sink: &'a mut D,
    table: &'a str,
}

impl<D: Sink> Writer<'_, D> {
    fn table(&self) -> &str {
        self.table
    }

    async fn write(&mut self, op: WriteOp<'_>) -> Result<u64> {
        let started = Instant::now();
        let rows = self.sink.execute(op).await?;
        metrics::record_write(self.table, op.name(), started.elapsed());
        trace!(operation = op.name(), rows, "Write executed");
        Ok(rows)
    }
}

/// The replication engine.
///
/// Copies a revisioned key-value store into one SQL table: first the
/// snapshot, then every later mutation in commit order.
///
/// The engine owns its destination handle for the whole run. The source is
/// shared, so the caller can keep using it (an in-process
/// [`MemorySource`](crate::source::MemorySource), or a client it also uses
/// elsewhere).
pub struct ReplicationEngine<S: ChangeSource, D: Sink> {
    /// Table and write policy, fixed for the run
    config: EngineConfig,

    /// Source change feed
    source: Arc<S>,

    /// Destination (one connection, prepared statements)
    sink: D,

    /// Engine state (broadcast to watchers)
    state_tx: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    state_rx: watch::Receiver<EngineState>,

    /// Progress of the current run
    summary: RunSummary,
}

impl<S: ChangeSource, D: Sink> ReplicationEngine<S, D> {
    /// Create a new replication engine.
    ///
    /// The engine starts in `Created` state. Call [`run()`](Self::run) to
    /// prepare the destination and begin replication.
    pub fn new(config: EngineConfig, source: Arc<S>, sink: D) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);

        Self {
            config,
            source,
            sink,
            state_tx,
            state_rx,
            summary: RunSummary::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Check if a run is in progress.
    pub fn is_running(&self) -> bool {
        let state = self.state();
        state != EngineState::Created && !state.is_terminal()
    }

    /// Progress so far. After a failed or cancelled run, shows how far it got.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state_tx.send(state);
        metrics::set_engine_state(&state.to_string());
    }

    /// Run the engine until the change stream ends.
    ///
    /// 1. Validates config and prepares the destination statements
    /// 2. Loads the snapshot and records its consistency point
    /// 3. Applies the change stream that starts right after it
    ///
    /// Returns `Ok` when the source closes the stream, and
    /// [`ReplicationError::Cancelled`] when `shutdown` is set to `true`
    /// (including a stream the source closed because of it). With a
    /// configured deadline, the whole run is bounded by it.
    ///
    /// A run is one-shot: calling this again returns `InvalidState`.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        if self.state() != EngineState::Created {
            return Err(ReplicationError::InvalidState {
                expected: "Created".to_string(),
                actual: self.state().to_string(),
            });
        }

        info!(
            table = %self.config.table,
            policy = self.config.policy.name(),
            "Starting replication engine"
        );

        let deadline = self
            .config
            .validate()
            .and_then(|()| self.config.deadline_duration());

        let result = match deadline {
            Err(e) => Err(e),
            Ok(None) => self.run_phases(shutdown).await,
            Ok(Some(limit)) => match tokio::time::timeout(limit, self.run_phases(shutdown)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(deadline_ms = limit.as_millis() as u64, "Run deadline exceeded");
                    Err(ReplicationError::DeadlineExceeded)
                }
            },
        };

        self.finish(result)
    }

    async fn run_phases(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let table = self.config.table.clone();
        let policy = self.config.policy;

        self.set_state(EngineState::Preparing);
        self.sink.prepare(&table, policy).await?;
        debug!(table = %table, policy = policy.name(), "Write statements prepared");

        self.set_state(EngineState::Snapshotting);
        let snapshot = self.source.snapshot(shutdown.clone());
        let consistency_point = {
            let mut writer = Writer {
                sink: &mut self.sink,
                table: &table,
            };
            snapshot::load_snapshot(snapshot, &mut writer, policy, &mut self.summary, &mut shutdown)
                .instrument(info_span!("snapshot", table = %table))
                .await?
        };

        self.set_state(EngineState::Streaming);
        let updates = self.source.watch(consistency_point + 1, shutdown.clone());
        let mut writer = Writer {
            sink: &mut self.sink,
            table: &table,
        };
        changes::apply_changes(
            updates,
            &mut writer,
            policy,
            consistency_point,
            &mut self.summary,
            &mut shutdown,
        )
        .instrument(info_span!("changes", table = %table, consistency_point))
        .await
    }

    fn finish(&mut self, result: Result<()>) -> Result<RunSummary> {
        match result {
            Ok(()) => {
                self.set_state(EngineState::Stopped);
                info!(
                    table = %self.config.table,
                    snapshot_records = self.summary.snapshot_records,
                    events_applied = self.summary.events_applied,
                    last_revision = ?self.summary.last_revision,
                    "Replication engine stopped"
                );
                Ok(self.summary.clone())
            }
            Err(e @ (ReplicationError::Cancelled | ReplicationError::DeadlineExceeded)) => {
                self.set_state(EngineState::Cancelled);
                info!(
                    table = %self.config.table,
                    reason = e.kind(),
                    rows_written = self.summary.rows_written(),
                    "Replication engine cancelled"
                );
                Err(e)
            }
            Err(e) => {
                self.set_state(EngineState::Failed);
                metrics::record_error(&self.config.table, e.kind());
                error!(
                    table = %self.config.table,
                    error = %e,
                    kind = e.kind(),
                    retryable = e.is_retryable(),
                    "Replication engine failed"
                );
                Err(e)
            }
        }
    }
}
