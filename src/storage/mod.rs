//! Storage module for persisting tracked series and discovered editions
//!
//! This module handles all database operations for the poller, including:
//! - SQLite database initialization and schema management
//! - Series listing and poll timestamps
//! - Edition dedup lookups and inserts
//! - Dismissal clearing
//! - Poll run history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::PollerError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> Result<SqliteStorage, PollerError> {
    Ok(SqliteStorage::new(path)?)
}

/// A tracked series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesRecord {
    pub id: i64,
    pub name: String,
    pub last_polled_at: Option<DateTime<Utc>>,
}

/// A collected edition known to exist for a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditionRecord {
    pub id: i64,
    pub series_id: i64,
    pub title: String,
    pub link: String,
    pub discovered_at: DateTime<Utc>,
}

/// An edition about to be inserted
#[derive(Debug, Clone)]
pub struct NewEdition<'a> {
    pub series_id: i64,
    pub title: &'a str,
    pub link: &'a str,
    pub discovered_at: DateTime<Utc>,
}

/// One recorded poll run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    pub checked: u32,
    pub inserted: u32,
    pub errors: u32,
}

/// Totals written when a poll run finishes
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub checked: u32,
    pub inserted: u32,
    pub errors: u32,
}
