//! SQLite-backed [`CredentialStore`].

use crate::{migrations, Credential, CredentialStore, StorageError, StorageResult, UpdateRecord};
use chrono::{DateTime, Utc};
use client_config_and_utils::Platform;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

const UPDATE_COLUMNS: &str =
    "version, url, platform, arch, is_downloaded, is_installed, created_at";

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at `path`, creating it and running migrations if needed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        migrations::run_migrations(&conn)?;

        info!(path = %path.display(), "Store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store for testing.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn set_flag(&self, version: &str, column: &str, value: bool) -> StorageResult<()> {
        let sql = format!("UPDATE updates SET {} = ?1 WHERE version = ?2", column);
        let changed = self.conn.lock().execute(&sql, params![value, version])?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("update {}", version)));
        }
        debug!(version, column, value, "Update flag set");
        Ok(())
    }
}

fn parse_datetime(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn update_from_row(row: &Row<'_>) -> rusqlite::Result<UpdateRecord> {
    let platform: String = row.get(2)?;
    let platform = platform.parse::<Platform>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(UpdateRecord {
        version: row.get(0)?,
        url: row.get(1)?,
        platform,
        arch: row.get(3)?,
        is_downloaded: row.get(4)?,
        is_installed: row.get(5)?,
        created_at: parse_datetime(row.get(6)?)?,
    })
}

impl CredentialStore for SqliteStore {
    fn add_user(&self, email: &str, password: &str) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        // Only the latest login is kept.
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM users", [])?;
        tx.execute(
            "INSERT INTO users (email, password, created_at) VALUES (?1, ?2, ?3)",
            params![email, password, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(email, "User persisted");
        Ok(())
    }

    fn delete_user(&self) -> StorageResult<()> {
        let removed = self.conn.lock().execute("DELETE FROM users", [])?;
        debug!(removed, "Persisted users deleted");
        Ok(())
    }

    fn last_user(&self) -> StorageResult<Option<Credential>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT email, password FROM users ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok(Credential::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(user)
    }

    fn get_update(&self, version: &str) -> StorageResult<Option<UpdateRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM updates WHERE version = ?1", UPDATE_COLUMNS);
        let record = conn
            .query_row(&sql, params![version], update_from_row)
            .optional()?;
        Ok(record)
    }

    fn add_update(
        &self,
        version: &str,
        url: &str,
        platform: Platform,
        arch: &str,
    ) -> StorageResult<UpdateRecord> {
        {
            let conn = self.conn.lock();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO updates (version, url, platform, arch, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![version, url, platform.as_str(), arch, Utc::now().to_rfc3339()],
            )?;
            if inserted > 0 {
                info!(version, url, platform = %platform, "Update recorded");
            }
        }

        self.get_update(version)?
            .ok_or_else(|| StorageError::NotFound(format!("update {} after insert", version)))
    }

    fn mark_downloaded(&self, version: &str) -> StorageResult<()> {
        self.set_flag(version, "is_downloaded", true)
    }

    fn mark_installed(&self, version: &str) -> StorageResult<()> {
        self.set_flag(version, "is_installed", true)
    }

    fn remove_downloaded(&self, version: &str) -> StorageResult<()> {
        self.set_flag(version, "is_downloaded", false)
    }

    fn last_update(&self) -> StorageResult<Option<UpdateRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM updates ORDER BY id DESC LIMIT 1", UPDATE_COLUMNS);
        let record = conn.query_row(&sql, [], update_from_row).optional()?;
        Ok(record)
    }
}
