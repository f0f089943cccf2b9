// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Destination integration.
//!
//! [`Sink`] is the seam between the engine and the relational destination.
//! [`SqlSink`] implements it over a single sqlx `Any` connection, so the
//! same engine drives PostgreSQL or SQLite.
//!
//! # Table Shapes
//!
//! The engine does not create or migrate tables. It expects:
//!
//! ```text
//! mutable:      key  (PRIMARY KEY / UNIQUE), value
//! append-only:  key, event (text), value, revision (bigint)
//! ```
//!
//! The table name is quoted as an identifier (`schema.table` becomes
//! `"schema"."table"`), which makes it case-sensitive on PostgreSQL.
//!
//! # Connection Ownership
//!
//! One connection is held for the whole run. Statements are prepared on it
//! up front and stay in its statement cache; nothing else may use the
//! connection while the engine runs.

use crate::config::{DeleteMatch, WritePolicy};
use crate::error::{ReplicationError, Result};
use crate::policy::WriteOp;
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool, Executor};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

/// Type alias for boxed sink futures.
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// What the engine needs from the destination.
pub trait Sink: Send {
    /// Prepare the write operations for `table` under `policy`.
    ///
    /// Called once, before any source data is read.
    fn prepare<'a>(&'a mut self, table: &'a str, policy: WritePolicy) -> SinkFuture<'a, ()>;

    /// Execute one write. Returns the number of rows affected.
    fn execute<'a>(&'a mut self, op: WriteOp<'a>) -> SinkFuture<'a, u64>;
}

/// Quote a SQL identifier, handling `schema.table`.
///
/// Embedded double quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Rendered SQL for one write policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statements {
    Mutable { upsert: String, delete: String },
    AppendOnly { append: String },
}

impl Statements {
    /// Render the statements for `table` under `policy`.
    pub fn render(table: &str, policy: WritePolicy) -> Self {
        let table = quote_ident(table);
        match policy {
            WritePolicy::AppendOnly => Statements::AppendOnly {
                append: format!(
                    "INSERT INTO {} (key, event, value, revision) VALUES ($1, $2, $3, $4)",
                    table
                ),
            },
            WritePolicy::Mutable { delete_match } => Statements::Mutable {
                upsert: format!(
                    "INSERT INTO {} (key, value) VALUES ($1, $2) \
                     ON CONFLICT (key) DO UPDATE SET value = excluded.value",
                    table
                ),
                delete: match delete_match {
                    DeleteMatch::Key => format!("DELETE FROM {} WHERE key = $1", table),
                    DeleteMatch::Value => format!("DELETE FROM {} WHERE value = $1", table),
                },
            },
        }
    }

    /// `(name, sql)` pairs, in preparation order.
    pub fn named(&self) -> Vec<(&'static str, &str)> {
        match self {
            Statements::Mutable { upsert, delete } => {
                vec![("upsert", upsert.as_str()), ("delete", delete.as_str())]
            }
            Statements::AppendOnly { append } => vec![("append", append.as_str())],
        }
    }

    fn policy_name(&self) -> &'static str {
        match self {
            Statements::Mutable { .. } => "mutable",
            Statements::AppendOnly { .. } => "append_only",
        }
    }
}

/// [`Sink`] over one sqlx `Any` connection.
pub struct SqlSink {
    conn: PoolConnection<Any>,
    statements: Option<Statements>,
}

impl SqlSink {
    /// Wrap a connection the caller already acquired.
    pub fn new(conn: PoolConnection<Any>) -> Self {
        Self {
            conn,
            statements: None,
        }
    }

    /// Open a single-connection pool for `url` (`postgres://…`, `sqlite://…`).
    ///
    /// Connection failures are preparation errors: no data has been read.
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| ReplicationError::prepare("connect", e))?;

        let sink = Self::acquire(&pool).await?;
        info!(backend = sink.conn.backend_name(), "Destination connected");
        Ok(sink)
    }

    /// Take one connection from a caller-owned pool for the run.
    pub async fn acquire(pool: &AnyPool) -> Result<Self> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| ReplicationError::prepare("acquire", e))?;
        Ok(Self::new(conn))
    }

    /// Statements rendered by `prepare()`, if it ran.
    pub fn statements(&self) -> Option<&Statements> {
        self.statements.as_ref()
    }
}

impl Sink for SqlSink {
    fn prepare<'a>(&'a mut self, table: &'a str, policy: WritePolicy) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            if table.trim().is_empty() {
                return Err(ReplicationError::prepare_msg("render", "table name is empty"));
            }

            let statements = Statements::render(table, policy);
            for (name, sql) in statements.named() {
                (&mut *self.conn)
                    .prepare(sql)
                    .await
                    .map_err(|e| ReplicationError::prepare(name, e))?;
                debug!(statement = name, sql, "Prepared statement");
            }

            self.statements = Some(statements);
            Ok(())
        })
    }

    fn execute<'a>(&'a mut self, op: WriteOp<'a>) -> SinkFuture<'a, u64> {
        Box::pin(async move {
            let statements = self.statements.as_ref().ok_or_else(|| ReplicationError::InvalidState {
                expected: "prepared".to_string(),
                actual: "unprepared".to_string(),
            })?;

            let query = match (statements, op) {
                (Statements::Mutable { upsert, .. }, WriteOp::Upsert { key, value }) => {
                    sqlx::query(upsert).bind(key).bind(value)
                }
                (Statements::Mutable { delete, .. }, WriteOp::DeleteByKey { key }) => {
                    sqlx::query(delete).bind(key)
                }
                (Statements::Mutable { delete, .. }, WriteOp::DeleteByValue { value }) => {
                    sqlx::query(delete).bind(value)
                }
                (
                    Statements::AppendOnly { append },
                    WriteOp::Append {
                        key,
                        kind,
                        value,
                        revision,
                    },
                ) => sqlx::query(append)
                    .bind(key)
                    .bind(kind.as_str())
                    .bind(value)
                    .bind(revision),
                (statements, op) => {
                    return Err(ReplicationError::InvalidState {
                        expected: format!("statement for {}", op.name()),
                        actual: format!("{} statements", statements.policy_name()),
                    })
                }
            };

            let done = query
                .execute(&mut *self.conn)
                .await
                .map_err(|e| ReplicationError::write(op.name(), e))?;
            Ok(done.rows_affected())
        })
    }
}
