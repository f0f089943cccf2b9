// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication engine.
//!
//! Every failure terminates the run and is returned to the caller. The
//! engine never retries internally; restarting (and therefore
//! re-snapshotting) is the caller's decision.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Prepare` | No | Destination statement setup failed (bad table, no connection) |
//! | `Source` | Depends | Source reported a failure during snapshot or streaming |
//! | `Write` | Yes | A destination write failed mid-run |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Engine state machine violation |
//! | `Cancelled` | No | Caller signalled shutdown |
//! | `DeadlineExceeded` | Yes | The configured run deadline elapsed |
//!
//! # Retry Behavior
//!
//! [`ReplicationError::is_retryable()`] is advice for the caller's restart
//! policy only.

use crate::source::SourceError;
use thiserror::Error;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur during replication.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Destination write-operation setup failed.
    ///
    /// Raised before any source data is read: malformed table name,
    /// missing table or columns, connection unavailable.
    #[error("Prepare error ({statement}): {message}")]
    Prepare {
        statement: String,
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// The source store reported a failure (propagated verbatim).
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A destination write failed.
    ///
    /// No rollback beyond the destination's own statement atomicity.
    #[error("Write error ({operation}): {message}")]
    Write {
        operation: String,
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine state machine violation
    /// (e.g., calling `run()` on an engine that already ran).
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The caller signalled shutdown.
    #[error("Replication cancelled")]
    Cancelled,

    /// The run deadline elapsed before the engine finished.
    #[error("Replication deadline exceeded")]
    DeadlineExceeded,
}

impl ReplicationError {
    /// Create a preparation error from a sqlx error.
    pub fn prepare(statement: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Prepare {
            statement: statement.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a preparation error without source
    pub fn prepare_msg(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Prepare {
            statement: statement.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a write error from a sqlx error.
    pub fn write(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Write {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a write error without source
    pub fn write_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Prepare { .. } => "prepare",
            Self::Source(_) => "source",
            Self::Write { .. } => "write",
            Self::Config(_) => "config",
            Self::InvalidState { .. } => "invalid_state",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// Check if restarting the engine could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Prepare { .. } => false, // Table or statement is wrong
            Self::Source(e) => e.is_retryable(),
            Self::Write { .. } => true, // Connection drops, lock timeouts
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Cancelled => false,
            Self::DeadlineExceeded => true,
        }
    }

    /// Check if this is the caller's own cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
