//! Shared test utilities for integration and property tests.
//!
//! This module provides:
//! - A scripted ChangeSource for driving exact snapshot/stream sequences
//! - A recording Sink for asserting the writes the engine issues
//! - SQLite (tempfile) and PostgreSQL (testcontainers) destinations

#![allow(dead_code)]

pub mod containers;
pub mod mock_sink;
pub mod scripted_source;
pub mod sqlite;

pub use containers::*;
pub use mock_sink::*;
pub use scripted_source::*;
pub use sqlite::*;
