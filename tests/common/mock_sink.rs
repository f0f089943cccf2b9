//! Mock Sink for testing.
//!
//! Records prepare() and every execute() call for assertions. Clones share
//! the same record, so a test keeps one handle while the engine owns another.
//! Can be told to fail prepare or to fail after N writes.

use kv2sql::config::WritePolicy;
use kv2sql::policy::WriteOp;
use kv2sql::sink::{Sink, SinkFuture};
use kv2sql::ReplicationError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A recorded write, with keys and values as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Upsert { key: String, value: String },
    DeleteByKey { key: String },
    DeleteByValue { value: String },
    Append { key: String, kind: String, value: String, revision: i64 },
}

impl Write {
    fn from_op(op: WriteOp<'_>) -> Self {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        match op {
            WriteOp::Upsert { key, value } => Write::Upsert {
                key: text(key),
                value: text(value),
            },
            WriteOp::DeleteByKey { key } => Write::DeleteByKey { key: text(key) },
            WriteOp::DeleteByValue { value } => Write::DeleteByValue { value: text(value) },
            WriteOp::Append {
                key,
                kind,
                value,
                revision,
            } => Write::Append {
                key: text(key),
                kind: kind.as_str().to_string(),
                value: text(value),
                revision,
            },
        }
    }
}

#[derive(Default)]
struct Recorded {
    prepared: Option<(String, WritePolicy)>,
    writes: Vec<Write>,
}

/// Mock implementation of Sink that records all calls.
///
/// # Example
/// ```rust,ignore
/// let sink = MockSink::new();
/// let mut engine = ReplicationEngine::new(config, source, sink.clone());
/// engine.run(shutdown).await?;
/// assert_eq!(sink.writes().len(), 3);
/// ```
#[derive(Clone)]
pub struct MockSink {
    recorded: Arc<Mutex<Recorded>>,
    /// Writes allowed before failing
    fail_after: Arc<AtomicUsize>,
    fail_prepare: bool,
}

impl MockSink {
    /// Create a mock that accepts every write.
    pub fn new() -> Self {
        Self {
            recorded: Arc::new(Mutex::new(Recorded::default())),
            fail_after: Arc::new(AtomicUsize::new(usize::MAX)),
            fail_prepare: false,
        }
    }

    /// Create a mock whose prepare() fails, like a missing table.
    pub fn failing_prepare() -> Self {
        Self {
            fail_prepare: true,
            ..Self::new()
        }
    }

    /// Configure execute() to fail after N successful writes.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
    }

    /// The table and policy prepare() was called with.
    pub fn prepared(&self) -> Option<(String, WritePolicy)> {
        self.recorded.lock().unwrap().prepared.clone()
    }

    /// Get all recorded writes.
    pub fn writes(&self) -> Vec<Write> {
        self.recorded.lock().unwrap().writes.clone()
    }

    /// Replay the writes onto a key → value map (mutable mode).
    pub fn table_state(&self) -> BTreeMap<String, String> {
        let mut table = BTreeMap::new();
        for write in self.writes() {
            match write {
                Write::Upsert { key, value } => {
                    table.insert(key, value);
                }
                Write::DeleteByKey { key } => {
                    table.remove(&key);
                }
                Write::DeleteByValue { value } => table.retain(|_, v| *v != value),
                Write::Append { .. } => {}
            }
        }
        table
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MockSink {
    fn prepare<'a>(&'a mut self, table: &'a str, policy: WritePolicy) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_prepare {
                return Err(ReplicationError::prepare_msg(
                    "upsert",
                    format!("no such table: {}", table),
                ));
            }
            self.recorded.lock().unwrap().prepared = Some((table.to_string(), policy));
            Ok(())
        })
    }

    fn execute<'a>(&'a mut self, op: WriteOp<'a>) -> SinkFuture<'a, u64> {
        Box::pin(async move {
            let mut recorded = self.recorded.lock().unwrap();
            if recorded.writes.len() >= self.fail_after.load(Ordering::SeqCst) {
                return Err(ReplicationError::write_msg(op.name(), "connection reset"));
            }
            recorded.writes.push(Write::from_op(op));
            Ok(1)
        })
    }
}
