//! SQLite persistence for seen and delivered announcements.
//!
//! One table, keyed by the site's news identifier. Every statement runs in
//! SQLite's autocommit mode, so each insert and each delivery mark is durable
//! on its own and a crash between items loses nothing already recorded. The
//! store assumes it is the only process using the database.

use crate::models::NewsRecord;
use rusqlite::{Connection, OptionalExtension, params};
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS news (
    news_id TEXT PRIMARY KEY,
    title TEXT,
    date DATE,
    created_at DATETIME,
    updated_at DATETIME,
    details TEXT,
    news_url TEXT,
    sent INTEGER
);
"#;

/// SQLite-backed record of every announcement seen and whether it was sent.
///
/// Each statement runs in autocommit mode, so whatever a run managed to write
/// before an error stays on disk.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, Box<dyn Error>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::from_connection(Connection::open(path)?)?;
        info!(records = store.count()?, "Database ready");
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, Box<dyn Error>> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, Box<dyn Error>> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Delivery status of `news_id`: `None` when never seen, otherwise the
    /// sent flag.
    pub fn status(&self, news_id: &str) -> Result<Option<bool>, Box<dyn Error>> {
        let sent = self
            .conn
            .query_row(
                "SELECT sent FROM news WHERE news_id = ?1",
                params![news_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(sent.map(|s| s == Some(1)))
    }

    /// Insert a new unsent record. Returns `false` and leaves the existing row
    /// untouched when the identifier is already stored.
    #[instrument(level = "debug", skip_all, fields(news_id = %record.news_id))]
    pub fn insert(&self, record: &NewsRecord) -> Result<bool, Box<dyn Error>> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO news
                (news_id, title, date, created_at, updated_at, details, news_url, sent)
             VALUES (?1, ?2, ?3, datetime('now'), datetime('now'), ?4, ?5, 0)",
            params![
                record.news_id,
                record.title,
                record.date,
                record.details,
                record.news_url
            ],
        )?;
        debug!(inserted = changed > 0, "Insert news record");
        Ok(changed > 0)
    }

    /// Flag `news_id` as delivered. The flag is never cleared again.
    #[instrument(level = "debug", skip(self))]
    pub fn mark_sent(&self, news_id: &str) -> Result<(), Box<dyn Error>> {
        self.conn.execute(
            "UPDATE news SET sent = 1, updated_at = datetime('now') WHERE news_id = ?1",
            params![news_id],
        )?;
        Ok(())
    }

    /// Load one stored announcement.
    ///
    /// # Arguments
    ///
    /// * `news_id` - Identifier taken from the detail-page URL
    ///
    /// # Returns
    ///
    /// The full row, or `None` if the identifier was never inserted.
    pub fn get(&self, news_id: &str) -> Result<Option<NewsRecord>, Box<dyn Error>> {
        let record = self
            .conn
            .query_row(
                // DATE/DATETIME columns have numeric affinity; read them back as text.
                "SELECT news_id, title, CAST(date AS TEXT), CAST(created_at AS TEXT),
                        CAST(updated_at AS TEXT), details, news_url, sent
                 FROM news WHERE news_id = ?1",
                params![news_id],
                |row| {
                    Ok(NewsRecord {
                        news_id: row.get(0)?,
                        title: row.get(1)?,
                        date: row.get(2)?,
                        created_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        updated_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        details: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        news_url: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        sent: row.get::<_, Option<i64>>(7)? == Some(1),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Identifiers stored but not yet delivered.
    ///
    /// # Returns
    ///
    /// News ids whose `sent` flag is not set, in ascending order.
    pub fn pending(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let mut stmt = self
            .conn
            .prepare("SELECT news_id FROM news WHERE sent IS NOT 1 ORDER BY news_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Number of announcements stored, sent or not.
    pub fn count(&self) -> Result<usize, Box<dyn Error>> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
