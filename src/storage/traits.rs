//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{EditionRecord, NewEdition, RunRecord, RunTotals, SeriesRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Series not found: {0}")]
    SeriesNotFound(i64),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every store operation the poller and its management
/// commands need. The poller holds the backend behind a mutex, so
/// implementations only need to be `Send`.
pub trait Storage: Send {
    // ===== Series =====

    /// Lists every tracked series, ordered by id
    fn list_series(&self) -> StorageResult<Vec<SeriesRecord>>;

    /// Gets a series by ID
    fn get_series(&self, series_id: i64) -> StorageResult<SeriesRecord>;

    /// Starts tracking a series and returns its ID
    fn add_series(&mut self, name: &str) -> StorageResult<i64>;

    /// Records that a series was polled at `at`
    fn touch_series(&mut self, series_id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    // ===== Editions =====

    /// Returns the IDs of editions with exactly this title for the series
    fn find_editions(&self, series_id: i64, title: &str) -> StorageResult<Vec<i64>>;

    /// Inserts a new edition and returns its ID
    ///
    /// Fails with `ConstraintViolation` if the (series, title) pair exists.
    fn insert_edition(&mut self, edition: &NewEdition<'_>) -> StorageResult<i64>;

    /// Lists the editions known for a series, oldest first
    fn list_editions(&self, series_id: i64) -> StorageResult<Vec<EditionRecord>>;

    // ===== Dismissals =====

    /// Deletes every dismissal for the series and returns how many were removed
    fn clear_dismissals(&mut self, series_id: i64) -> StorageResult<usize>;

    /// Records a dismissal for the series
    fn add_dismissal(&mut self, series_id: i64) -> StorageResult<()>;

    /// Counts the dismissals recorded for the series
    fn count_dismissals(&self, series_id: i64) -> StorageResult<u64>;

    // ===== Run History =====

    /// Creates a poll run record
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run as finished with its totals
    fn complete_run(&mut self, run_id: i64, totals: RunTotals) -> StorageResult<()>;

    /// Gets the most recent runs, newest first
    fn recent_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>>;
}
