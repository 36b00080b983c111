//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the TPB-Poller database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Tracked series
CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    last_poll TEXT
);

-- Collected editions known to exist; the title is the dedup key per series
CREATE TABLE IF NOT EXISTS editions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    UNIQUE(series_id, title)
);

CREATE INDEX IF NOT EXISTS idx_editions_series ON editions(series_id);

-- User acknowledgements of the currently known editions
CREATE TABLE IF NOT EXISTS dismissals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    dismissed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dismissals_series ON dismissals(series_id);

-- Poll run history
CREATE TABLE IF NOT EXISTS poll_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    checked INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
