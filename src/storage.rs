//! The storage module keeps a per-book SQLite manifest of fetched content items
//! and completed crawls, so interrupted runs resume item by item.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::Source;
use crate::constants::MANIFEST_FILE;

/// Storage provides manifest operations for one book directory.
pub struct Storage {
    /// The underlying SQLite connection wrapped in Arc<Mutex<>> to make it thread-safe
    conn: Arc<Mutex<Connection>>,
    /// The book directory the manifest belongs to
    book_dir: PathBuf,
}

impl Storage {
    /// Opens (creating if needed) the manifest of the given book directory.
    ///
    /// # Arguments
    ///
    /// * `book_dir` - The book's working directory; created when missing
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the database cannot be created
    pub fn open(book_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(book_dir)
            .with_context(|| format!("Unable to create {}", book_dir.display()))?;
        let conn = Connection::open(book_dir.join(MANIFEST_FILE))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            book_dir: book_dir.to_path_buf(),
        })
    }

    /// Opens the manifest only if the book directory already has one.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing manifest cannot be opened
    pub fn open_existing(book_dir: &Path) -> Result<Option<Self>> {
        if !book_dir.join(MANIFEST_FILE).exists() {
            return Ok(None);
        }
        Self::open(book_dir).map(Some)
    }

    /// Initializes the manifest schema if it doesn't exist.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                content_id TEXT NOT NULL,
                source TEXT NOT NULL,
                source_url TEXT NOT NULL,
                raw_path TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                PRIMARY KEY (source, content_id)
            );
            CREATE TABLE IF NOT EXISTS crawls (
                source TEXT PRIMARY KEY,
                completed_at INTEGER NOT NULL
            );",
        )?;

        Ok(())
    }

    /// Records a fetched content item, replacing an earlier record of the same item.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned
    pub fn record_item(&self, item: &ContentItem) -> Result<()> {
        let raw_path = item
            .raw_path
            .strip_prefix(&self.book_dir)
            .unwrap_or(&item.raw_path);
        let conn = self.conn.lock().expect("Storage mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO items (content_id, source, source_url, raw_path, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.content_id,
                item.source.as_str(),
                item.source_url,
                raw_path.to_string_lossy(),
                item.fetched_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    /// Checks whether an item is already recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned
    pub fn has_item(&self, source: Source, content_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("Storage mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT 1 FROM items WHERE source = ?1 AND content_id = ?2")?;
        let found: Option<i64> = stmt
            .query_row(params![source.as_str(), content_id], |row| row.get(0))
            .optional()?;

        Ok(found.is_some())
    }

    /// Lists every recorded item in the order it was fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails or a row is malformed
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned
    pub fn list_items(&self) -> Result<Vec<ContentItem>> {
        let conn = self.conn.lock().expect("Storage mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT content_id, source, source_url, raw_path, fetched_at FROM items ORDER BY fetched_at ASC, rowid ASC",
        )?;
        let rows: Result<Vec<ItemRow>, rusqlite::Error> = stmt
            .query_map([], |row| {
                Ok(ItemRow {
                    content_id: row.get(0)?,
                    source: row.get(1)?,
                    source_url: row.get(2)?,
                    raw_path: row.get(3)?,
                    fetched_at: row.get(4)?,
                })
            })?
            .collect();

        rows?
            .into_iter()
            .map(|row| {
                let mut item = ContentItem::try_from(row)?;
                item.raw_path = self.book_dir.join(item.raw_path);
                Ok(item)
            })
            .collect()
    }

    /// Marks the crawl of a source as complete.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned
    pub fn mark_crawl_complete(&self, source: Source) -> Result<()> {
        let conn = self.conn.lock().expect("Storage mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO crawls (source, completed_at) VALUES (?1, ?2)",
            params![source.as_str(), Utc::now().timestamp()],
        )?;

        Ok(())
    }

    /// Returns when the crawl of a source completed, if it did.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned
    pub fn crawl_completed_at(&self, source: Source) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().expect("Storage mutex poisoned");
        let mut stmt = conn.prepare("SELECT completed_at FROM crawls WHERE source = ?1")?;
        let completed_at: Option<i64> = stmt
            .query_row([source.as_str()], |row| row.get(0))
            .optional()?;

        Ok(completed_at.and_then(DateTime::from_timestamp_secs))
    }
}

/// Represents an item row stored in the manifest
#[derive(Debug)]
pub struct ItemRow {
    pub content_id: String,
    pub source: String,
    pub source_url: String,
    pub raw_path: String,
    pub fetched_at: i64,
}

/// One unit of fetched source material for a book.
#[derive(Clone, Debug)]
pub struct ContentItem {
    pub source: Source,
    pub source_url: String,
    pub content_id: String,
    pub raw_path: PathBuf,
    pub fetched_at: DateTime<Utc>,
}

impl ContentItem {
    /// Creates an item fetched just now.
    pub fn new(source: Source, source_url: &str, content_id: &str, raw_path: PathBuf) -> Self {
        Self {
            source,
            source_url: source_url.to_string(),
            content_id: content_id.to_string(),
            raw_path,
            fetched_at: Utc::now(),
        }
    }
}

impl TryFrom<ItemRow> for ContentItem {
    type Error = anyhow::Error;

    fn try_from(item_row: ItemRow) -> Result<Self> {
        Ok(ContentItem {
            source: item_row
                .source
                .parse()
                .map_err(|e| anyhow::anyhow!("Unable to read source from manifest: {e}"))?,
            source_url: item_row.source_url,
            content_id: item_row.content_id,
            raw_path: PathBuf::from(item_row.raw_path),
            fetched_at: DateTime::from_timestamp_secs(item_row.fetched_at)
                .context("Unable to initialize fetched_at from manifest")?,
        })
    }
}
