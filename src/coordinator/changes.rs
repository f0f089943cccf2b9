// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Streaming phase: apply mutations after the consistency point.
//!
//! Events are applied one at a time in arrival order. The loop ends when:
//! - the source closes the channel (`Ok`, or `Cancelled` if shutdown was set)
//! - the source sends an error (returned as is)
//! - a write fails (returned as is)
//! - shutdown is signalled (`Cancelled`)
//!
//! # Replay Boundary
//!
//! A source may redeliver events after reconnecting internally. Anything at
//! or below the consistency point is already covered by the snapshot, and
//! anything older than the last applied revision would move a key backwards,
//! so both are skipped. Equal revisions pass: one transaction commits several
//! keys under a single revision.

use super::{shutdown_signalled, RunSummary, Writer};
use crate::config::WritePolicy;
use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::sink::Sink;
use crate::source::WatchReceiver;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Apply the change stream until it ends.
pub(super) async fn apply_changes<D: Sink>(
    mut updates: WatchReceiver,
    writer: &mut Writer<'_, D>,
    policy: WritePolicy,
    consistency_point: i64,
    summary: &mut RunSummary,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    info!(start_revision = consistency_point + 1, "Streaming changes");

    let mut last_revision = consistency_point;

    loop {
        let unit = tokio::select! {
            biased;

            _ = shutdown_signalled(shutdown) => {
                info!(applied = summary.events_applied, "Change stream cancelled");
                return Err(ReplicationError::Cancelled);
            }

            unit = updates.recv() => unit,
        };

        let batch = match unit {
            Some(Ok(batch)) => batch,
            Some(Err(err)) => {
                warn!(error = %err, last_revision, "Change stream failed at source");
                return Err(err.into());
            }
            None => break,
        };

        metrics::record_events_read(writer.table(), batch.len());

        for event in &batch.events {
            let revision = event.revision();

            if revision <= consistency_point || revision < last_revision {
                warn!(revision, last_revision, "Skipping replayed event");
                summary.events_skipped += 1;
                metrics::record_event_skipped(writer.table(), "replayed");
                continue;
            }
            last_revision = revision;

            let Some(op) = policy.plan_event(event) else {
                warn!(
                    revision,
                    key = %String::from_utf8_lossy(event.key()),
                    "Skipping delete without previous value, row left in place"
                );
                summary.events_skipped += 1;
                metrics::record_event_skipped(writer.table(), "unmatched_delete");
                continue;
            };

            writer.write(op).await?;

            summary.events_applied += 1;
            summary.last_revision = Some(revision);
            metrics::record_event_applied(writer.table(), event.kind().as_str());
            metrics::set_last_applied_revision(writer.table(), revision);
        }

        debug!(events = batch.len(), last_revision, "Change batch applied");
    }

    // The source closes the stream when shutdown fires
    if *shutdown.borrow() {
        info!(applied = summary.events_applied, "Change stream closed after shutdown");
        return Err(ReplicationError::Cancelled);
    }

    info!(
        applied = summary.events_applied,
        skipped = summary.events_skipped,
        "Change stream ended"
    );
    Ok(())
}
