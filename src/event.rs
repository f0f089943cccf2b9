// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Records and mutation events produced by the source store.
//!
//! Keys and values are opaque byte strings. Revisions are assigned by the
//! source and increase monotonically; several events committed in one
//! transaction share a revision.

use std::fmt;

/// Mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Put,
    Delete,
}

impl EventKind {
    /// Label written into the append-only log's `event` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Put => "PUT",
            EventKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value pair as of the snapshot's consistency point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Revision of the last mutation to this key.
    pub revision: i64,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, revision: i64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            revision,
        }
    }
}

/// One chunk of a snapshot.
///
/// Every batch of a snapshot carries the same `revision` (the consistency
/// point). The final batch has `more == false`.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub revision: i64,
    pub records: Vec<Record>,
    pub more: bool,
}

impl RecordBatch {
    /// A single batch holding the whole snapshot.
    pub fn complete(revision: i64, records: Vec<Record>) -> Self {
        Self {
            revision,
            records,
            more: false,
        }
    }

    /// Whether this is the end-of-data batch.
    pub fn is_last(&self) -> bool {
        !self.more
    }
}

/// A change notification from the source's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        revision: i64,
    },
    Delete {
        key: Vec<u8>,
        revision: i64,
        /// Value the key held before deletion, when the source knows it.
        prev_value: Option<Vec<u8>>,
    },
}

impl MutationEvent {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, revision: i64) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
            revision,
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>, revision: i64) -> Self {
        Self::Delete {
            key: key.into(),
            revision,
            prev_value: None,
        }
    }

    /// Delete carrying the key's last known value.
    pub fn delete_with_prev(
        key: impl Into<Vec<u8>>,
        prev_value: impl Into<Vec<u8>>,
        revision: i64,
    ) -> Self {
        Self::Delete {
            key: key.into(),
            revision,
            prev_value: Some(prev_value.into()),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            MutationEvent::Put { .. } => EventKind::Put,
            MutationEvent::Delete { .. } => EventKind::Delete,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            MutationEvent::Put { key, .. } | MutationEvent::Delete { key, .. } => key,
        }
    }

    /// Value carried by the event; empty for deletes.
    pub fn value(&self) -> &[u8] {
        match self {
            MutationEvent::Put { value, .. } => value,
            MutationEvent::Delete { .. } => &[],
        }
    }

    pub fn revision(&self) -> i64 {
        match self {
            MutationEvent::Put { revision, .. } | MutationEvent::Delete { revision, .. } => {
                *revision
            }
        }
    }
}

/// One unit of the change stream, in commit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<MutationEvent>,
}

impl EventBatch {
    pub fn new(events: Vec<MutationEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
