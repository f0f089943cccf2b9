// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Snapshot phase: load the key space at the consistency point.
//!
//! The source fills two channels: snapshot batches and a terminal error.
//! Each wait races three arms:
//!
//! ```text
//! biased select!
//!   1. errors.recv()       → abort with the source error (nothing written if first)
//!   2. shutdown signalled  → abort with Cancelled (a stalled source cannot hang us)
//!   3. batches.recv()      → write every record, stop after the `more == false` batch
//! ```
//!
//! The consistency point is the first batch's revision. Every later batch
//! must report the same one.

use super::{shutdown_signalled, RunSummary, Writer};
use crate::config::WritePolicy;
use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::sink::Sink;
use crate::source::{Snapshot, SourceError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Drain a snapshot into the destination.
///
/// Returns the consistency point.
pub(super) async fn load_snapshot<D: Sink>(
    mut snapshot: Snapshot,
    writer: &mut Writer<'_, D>,
    policy: WritePolicy,
    summary: &mut RunSummary,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<i64> {
    let started = Instant::now();
    let mut consistency_point: Option<i64> = None;

    loop {
        let batch = tokio::select! {
            biased;

            Some(err) = snapshot.errors.recv() => {
                warn!(
                    error = %err,
                    records = summary.snapshot_records,
                    "Snapshot failed at source"
                );
                return Err(err.into());
            }

            _ = shutdown_signalled(shutdown) => {
                info!(records = summary.snapshot_records, "Snapshot cancelled");
                return Err(ReplicationError::Cancelled);
            }

            batch = snapshot.batches.recv() => match batch {
                Some(batch) => batch,
                None => return Err(SourceError::Truncated.into()),
            },
        };

        let revision = *consistency_point.get_or_insert(batch.revision);
        if batch.revision != revision {
            return Err(SourceError::InconsistentSnapshot {
                expected: revision,
                actual: batch.revision,
            }
            .into());
        }
        if summary.consistency_point.is_none() {
            summary.consistency_point = Some(revision);
            metrics::set_consistency_point(writer.table(), revision);
        }

        for record in &batch.records {
            writer.write(policy.plan_record(record)).await?;
            summary.snapshot_records += 1;
        }
        summary.snapshot_batches += 1;
        metrics::record_snapshot_batch(writer.table(), batch.records.len());

        debug!(
            revision,
            records = batch.records.len(),
            more = batch.more,
            "Snapshot batch applied"
        );

        if batch.is_last() {
            metrics::record_snapshot_complete(
                writer.table(),
                summary.snapshot_records,
                started.elapsed(),
            );
            info!(
                consistency_point = revision,
                records = summary.snapshot_records,
                batches = summary.snapshot_batches,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Snapshot loaded"
            );
            return Ok(revision);
        }
    }
}
