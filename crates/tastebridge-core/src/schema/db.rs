use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::{ContentKind, TrackMatch};
use crate::store::{KeyValueStore, MatchStore};

use super::migrations::MIGRATIONS;

/// A SQLite database implementing the key/value and match-cache seams.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.apply_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::LockPoisoned("database connection"))
    }

    fn apply_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        // Create migrations table if it doesn't exist
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        // Get applied migrations
        let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        // Apply pending migrations
        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                conn.execute_batch(migration.sql)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }

    /// Number of applied migrations.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })?;
        Ok(version.unwrap_or(0))
    }

    /// All stored matches, newest first (for the override UI).
    pub fn list_matches(&self, limit: usize) -> Result<Vec<TrackMatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, title, artist, score, content_kind,
                    cached_at, is_manual_override
             FROM track_matches
             ORDER BY cached_at DESC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let matches = stmt
            .query_map([limit], row_to_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }
}

fn row_to_match(row: &rusqlite::Row) -> rusqlite::Result<TrackMatch> {
    let content_kind: String = row.get(5)?;
    let cached_at_str: String = row.get(6)?;
    let cached_at = DateTime::parse_from_rfc3339(&cached_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(TrackMatch {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        score: row.get(4)?,
        content_kind: ContentKind::parse(&content_kind),
        cached_at,
        is_manual_override: row.get::<_, i64>(7)? != 0,
    })
}

// Key/value entries
impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", [key])?;
        Ok(())
    }
}

// Track match CRUD
impl MatchStore for Database {
    fn get_match(&self, source_id: &str) -> Result<Option<TrackMatch>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT source_id, target_id, title, artist, score, content_kind,
                        cached_at, is_manual_override
                 FROM track_matches
                 WHERE source_id = ?1",
                [source_id],
                row_to_match,
            )
            .optional()?;
        Ok(found)
    }

    fn save_automatic_match(&self, entry: &TrackMatch) -> Result<bool> {
        let conn = self.conn()?;
        // The WHERE clause on the upsert keeps manual overrides untouched.
        let changed = conn.execute(
            "INSERT INTO track_matches (
                source_id, target_id, title, artist, score, content_kind,
                cached_at, is_manual_override
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
            ON CONFLICT(source_id) DO UPDATE SET
                target_id = excluded.target_id,
                title = excluded.title,
                artist = excluded.artist,
                score = excluded.score,
                content_kind = excluded.content_kind,
                cached_at = excluded.cached_at
            WHERE track_matches.is_manual_override = 0",
            rusqlite::params![
                entry.source_id,
                entry.target_id,
                entry.title,
                entry.artist,
                entry.score,
                entry.content_kind.as_str(),
                entry.cached_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn save_override(&self, entry: &TrackMatch) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO track_matches (
                source_id, target_id, title, artist, score, content_kind,
                cached_at, is_manual_override
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
            ON CONFLICT(source_id) DO UPDATE SET
                target_id = excluded.target_id,
                title = excluded.title,
                artist = excluded.artist,
                score = excluded.score,
                content_kind = excluded.content_kind,
                cached_at = excluded.cached_at,
                is_manual_override = 1",
            rusqlite::params![
                entry.source_id,
                entry.target_id,
                entry.title,
                entry.artist,
                entry.score,
                entry.content_kind.as_str(),
                entry.cached_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_automatic_match(&self, source_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM track_matches WHERE source_id = ?1 AND is_manual_override = 0",
            [source_id],
        )?;
        Ok(deleted > 0)
    }

    fn matches_for_target(&self, target_id: &str) -> Result<Vec<TrackMatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, title, artist, score, content_kind,
                    cached_at, is_manual_override
             FROM track_matches
             WHERE target_id = ?1
             ORDER BY source_id",
        )?;
        let matches = stmt
            .query_map([target_id], row_to_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }
}
