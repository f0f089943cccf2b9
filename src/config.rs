//! Configuration for the replication engine.
//!
//! Configuration is an explicit, immutable value passed to
//! [`ReplicationEngine::new()`](crate::ReplicationEngine::new). It can be
//! constructed programmatically or deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use kv2sql::config::{EngineConfig, WritePolicy};
//!
//! let config = EngineConfig {
//!     table: "public.kv_log".into(),
//!     policy: WritePolicy::from_append_only(true),
//!     ..EngineConfig::for_testing("kv")
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! table: "public.settings"
//! policy:
//!   mode: mutable
//!   delete_match: key
//! deadline: "12h"
//! ```

use crate::error::{ReplicationError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// EngineConfig: passed from the caller to ReplicationEngine::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `ReplicationEngine::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Destination table, optionally schema-qualified (`schema.table`).
    pub table: String,

    /// How source mutations map onto destination rows.
    #[serde(default)]
    pub policy: WritePolicy,

    /// Optional bound on the whole run as a duration string (e.g., "30m").
    /// Parsed to Duration internally.
    #[serde(default)]
    pub deadline: Option<String>,
}

impl EngineConfig {
    /// Create a minimal mutable-mode config for testing.
    pub fn for_testing(table: &str) -> Self {
        Self {
            table: table.to_string(),
            policy: WritePolicy::default(),
            deadline: None,
        }
    }

    /// Build from the two plain fields a command line supplies.
    pub fn new(table: impl Into<String>, append_only: bool) -> Self {
        Self {
            table: table.into(),
            policy: WritePolicy::from_append_only(append_only),
            deadline: None,
        }
    }

    /// Check the config before any connection is touched.
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(ReplicationError::Config("table name is empty".to_string()));
        }
        if self.table.contains('\0') {
            return Err(ReplicationError::Config(
                "table name contains a NUL byte".to_string(),
            ));
        }
        if self.table.split('.').any(|part| part.is_empty()) {
            return Err(ReplicationError::Config(format!(
                "table name has an empty component: {:?}",
                self.table
            )));
        }
        self.deadline_duration()?;
        Ok(())
    }

    /// Parse the deadline string.
    pub fn deadline_duration(&self) -> Result<Option<Duration>> {
        match &self.deadline {
            None => Ok(None),
            Some(raw) => humantime::parse_duration(raw)
                .map(Some)
                .map_err(|e| {
                    ReplicationError::Config(format!("invalid deadline {:?}: {}", raw, e))
                }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WritePolicy: mutable table vs append-only log
// ═══════════════════════════════════════════════════════════════════════════════

/// Write policy, fixed for the lifetime of one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WritePolicy {
    /// One current row per key: `(key PRIMARY KEY, value)`.
    Mutable {
        #[serde(default)]
        delete_match: DeleteMatch,
    },
    /// Immutable event log: `(key, event, value, revision)`, insert only.
    AppendOnly,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy::Mutable {
            delete_match: DeleteMatch::Key,
        }
    }
}

impl WritePolicy {
    /// Map the boolean "no overwrite" flag onto a policy.
    pub fn from_append_only(append_only: bool) -> Self {
        if append_only {
            WritePolicy::AppendOnly
        } else {
            WritePolicy::default()
        }
    }

    pub fn is_append_only(&self) -> bool {
        matches!(self, WritePolicy::AppendOnly)
    }

    /// Label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            WritePolicy::Mutable { .. } => "mutable",
            WritePolicy::AppendOnly => "append_only",
        }
    }
}

/// How mutable mode locates the row to remove on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMatch {
    /// `DELETE ... WHERE key = $1`.
    #[default]
    Key,
    /// `DELETE ... WHERE value = $1` using the key's last known value.
    ///
    /// Removes every row sharing that value and misses rows whose value
    /// changed since. Only for tables that were populated this way.
    Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
