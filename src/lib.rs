//! # kv2sql
//!
//! Change-data-capture bridge from a revisioned key-value store into one
//! SQL table.
//!
//! ## Architecture
//!
//! The engine sits between a source change feed and a destination
//! connection, and runs two strictly sequenced phases:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                                kv2sql                                    │
//! │                                                                          │
//! │  ┌──────────────┐  RecordBatch  ┌────────────┐   WriteOp   ┌──────────┐  │
//! │  │ ChangeSource │──────────────►│  snapshot  │────────────►│          │  │
//! │  │              │               └────────────┘             │   Sink   │  │
//! │  │              │  EventBatch   ┌────────────┐   WriteOp   │ (SqlSink)│  │
//! │  │              │──────────────►│  changes   │────────────►│          │  │
//! │  └──────────────┘  from cp + 1  └────────────┘             └──────────┘  │
//! │                                       ▲                                  │
//! │                             WritePolicy (mutable / append-only)          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! 1. **Snapshot**: every key at the consistency point `cp` is written once.
//! 2. **Changes**: every mutation after `cp` is applied in commit order.
//!
//! ## Write Policies
//!
//! - **Mutable**: one row per key. Puts upsert, deletes remove the row.
//! - **Append-only**: an immutable log. Every snapshot record and every
//!   mutation becomes a new `(key, event, value, revision)` row.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kv2sql::{EngineConfig, MemorySource, ReplicationEngine, SqlSink};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> kv2sql::Result<()> {
//!     let source = Arc::new(MemorySource::new());
//!     source.put("a", "1");
//!
//!     let sink = SqlSink::connect("sqlite://kv.db?mode=rwc").await?;
//!     let mut engine = ReplicationEngine::new(EngineConfig::new("kv", false), source, sink);
//!
//!     // Flip to true to stop streaming
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let summary = engine.run(shutdown_rx).await?;
//!     println!("applied {} events", summary.events_applied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod metrics;
pub mod policy;
pub mod sink;
pub mod source;

// Re-exports for convenience
pub use config::{DeleteMatch, EngineConfig, WritePolicy};
pub use coordinator::{EngineState, ReplicationEngine, RunSummary};
pub use error::{ReplicationError, Result};
pub use event::{EventBatch, EventKind, MutationEvent, Record, RecordBatch};
pub use policy::WriteOp;
pub use sink::{Sink, SinkFuture, SqlSink};
pub use source::{ChangeSource, MemorySource, Snapshot, SnapshotSender, SourceError, WatchReceiver};
