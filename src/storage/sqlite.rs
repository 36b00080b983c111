//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{EditionRecord, NewEdition, RunRecord, RunTotals, SeriesRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Raw connection, for tests that need to break the schema
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Reads an RFC 3339 timestamp column
fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a nullable RFC 3339 timestamp column
fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn series_from_row(row: &Row<'_>) -> rusqlite::Result<SeriesRecord> {
    Ok(SeriesRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        last_polled_at: optional_timestamp(row, 2)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: timestamp(row, 1)?,
        finished_at: optional_timestamp(row, 2)?,
        config_hash: row.get(3)?,
        checked: row.get(4)?,
        inserted: row.get(5)?,
        errors: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Series =====

    fn list_series(&self) -> StorageResult<Vec<SeriesRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, last_poll FROM series ORDER BY id")?;

        let series = stmt
            .query_map([], series_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(series)
    }

    fn get_series(&self, series_id: i64) -> StorageResult<SeriesRecord> {
        self.conn
            .query_row(
                "SELECT id, name, last_poll FROM series WHERE id = ?1",
                params![series_id],
                series_from_row,
            )
            .optional()?
            .ok_or(StorageError::SeriesNotFound(series_id))
    }

    fn add_series(&mut self, name: &str) -> StorageResult<i64> {
        self.conn
            .execute("INSERT INTO series (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn touch_series(&mut self, series_id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE series SET last_poll = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), series_id],
        )?;

        if updated == 0 {
            return Err(StorageError::SeriesNotFound(series_id));
        }
        Ok(())
    }

    // ===== Editions =====

    fn find_editions(&self, series_id: i64, title: &str) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM editions WHERE series_id = ?1 AND title = ?2")?;

        let ids = stmt
            .query_map(params![series_id, title], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    fn insert_edition(&mut self, edition: &NewEdition<'_>) -> StorageResult<i64> {
        let result = self.conn.execute(
            "INSERT INTO editions (series_id, title, link, discovered_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                edition.series_id,
                edition.title,
                edition.link,
                edition.discovered_at.to_rfc3339()
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(msg.unwrap_or_else(|| {
                    format!(
                        "edition '{}' for series {}",
                        edition.title, edition.series_id
                    )
                })))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_editions(&self, series_id: i64) -> StorageResult<Vec<EditionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, series_id, title, link, discovered_at FROM editions
             WHERE series_id = ?1 ORDER BY id",
        )?;

        let editions = stmt
            .query_map(params![series_id], |row| {
                Ok(EditionRecord {
                    id: row.get(0)?,
                    series_id: row.get(1)?,
                    title: row.get(2)?,
                    link: row.get(3)?,
                    discovered_at: timestamp(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(editions)
    }

    // ===== Dismissals =====

    fn clear_dismissals(&mut self, series_id: i64) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM dismissals WHERE series_id = ?1",
            params![series_id],
        )?;
        Ok(removed)
    }

    fn add_dismissal(&mut self, series_id: i64) -> StorageResult<()> {
        let result = self.conn.execute(
            "INSERT INTO dismissals (series_id, dismissed_at) VALUES (?1, ?2)",
            params![series_id, Utc::now().to_rfc3339()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::SeriesNotFound(series_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn count_dismissals(&self, series_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dismissals WHERE series_id = ?1",
            params![series_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run History =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO poll_runs (started_at, config_hash) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), config_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(&mut self, run_id: i64, totals: RunTotals) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE poll_runs SET finished_at = ?1, checked = ?2, inserted = ?3, errors = ?4
             WHERE id = ?5",
            params![
                Utc::now().to_rfc3339(),
                totals.checked,
                totals.inserted,
                totals.errors,
                run_id
            ],
        )?;
        Ok(())
    }

    fn recent_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, checked, inserted, errors
             FROM poll_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}
