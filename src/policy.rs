// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write-policy dispatch.
//!
//! Maps snapshot records and stream events onto destination writes:
//!
//! ```text
//!                     Mutable{Key}        Mutable{Value}         AppendOnly
//! snapshot record  →  Upsert(k, v)        Upsert(k, v)           Append(k, PUT, v, rev)
//! Put(k, v, rev)   →  Upsert(k, v)        Upsert(k, v)           Append(k, PUT, v, rev)
//! Delete(k, rev)   →  DeleteByKey(k)      DeleteByValue(prev)    Append(k, DELETE, "", rev)
//! ```
//!
//! Planning is pure; executing a [`WriteOp`] is the sink's job.

use crate::config::{DeleteMatch, WritePolicy};
use crate::event::{EventKind, MutationEvent, Record};

/// A single destination write, borrowing from the record or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp<'a> {
    Upsert {
        key: &'a [u8],
        value: &'a [u8],
    },
    DeleteByKey {
        key: &'a [u8],
    },
    DeleteByValue {
        value: &'a [u8],
    },
    Append {
        key: &'a [u8],
        kind: EventKind,
        value: &'a [u8],
        revision: i64,
    },
}

impl WriteOp<'_> {
    /// Operation name used in errors, logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::Upsert { .. } => "upsert",
            WriteOp::DeleteByKey { .. } | WriteOp::DeleteByValue { .. } => "delete",
            WriteOp::Append { .. } => "append",
        }
    }
}

impl WritePolicy {
    /// Plan the write for one snapshot record.
    pub fn plan_record<'a>(&self, record: &'a Record) -> WriteOp<'a> {
        match self {
            WritePolicy::AppendOnly => WriteOp::Append {
                key: &record.key,
                kind: EventKind::Put,
                value: &record.value,
                revision: record.revision,
            },
            WritePolicy::Mutable { .. } => WriteOp::Upsert {
                key: &record.key,
                value: &record.value,
            },
        }
    }

    /// Plan the write for one stream event.
    ///
    /// Returns `None` only for a value-matched delete whose previous value
    /// is unknown: there is nothing to match against.
    pub fn plan_event<'a>(&self, event: &'a MutationEvent) -> Option<WriteOp<'a>> {
        match (self, event) {
            (WritePolicy::AppendOnly, _) => Some(WriteOp::Append {
                key: event.key(),
                kind: event.kind(),
                value: event.value(),
                revision: event.revision(),
            }),
            (WritePolicy::Mutable { .. }, MutationEvent::Put { key, value, .. }) => {
                Some(WriteOp::Upsert { key, value })
            }
            (
                WritePolicy::Mutable {
                    delete_match: DeleteMatch::Key,
                },
                MutationEvent::Delete { key, .. },
            ) => Some(WriteOp::DeleteByKey { key }),
            (
                WritePolicy::Mutable {
                    delete_match: DeleteMatch::Value,
                },
                MutationEvent::Delete { prev_value, .. },
            ) => prev_value
                .as_deref()
                .map(|value| WriteOp::DeleteByValue { value }),
        }
    }
}
