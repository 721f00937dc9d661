//! Bucket storage trait and SQLite implementation.
//!
//! Entries live in named buckets and carry a monotonic insertion sequence,
//! so FIFO eviction order is explicit rather than an artifact of iteration.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::entry::CacheEntry;

/// Trait for cache bucket storage backends.
pub trait BucketStore: Send + Sync {
  /// Store an entry in `bucket`, keyed by its URL.
  ///
  /// Re-storing an existing URL replaces the entry and counts as a new
  /// insertion for eviction ordering.
  fn put(&self, bucket: &str, entry: &CacheEntry) -> Result<()>;

  /// Exact-URL lookup in one bucket.
  fn get(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>>;

  /// Exact-URL lookup across several buckets, first hit wins.
  fn get_any(&self, buckets: &[&str], url: &str) -> Result<Option<CacheEntry>> {
    for bucket in buckets {
      if let Some(entry) = self.get(bucket, url)? {
        return Ok(Some(entry));
      }
    }
    Ok(None)
  }

  /// Number of entries in `bucket`.
  fn count(&self, bucket: &str) -> Result<u64>;

  /// Delete the oldest entry (lowest insertion sequence) from `bucket`.
  /// Returns the evicted URL, or None if the bucket is empty.
  fn evict_oldest(&self, bucket: &str) -> Result<Option<String>>;

  /// URLs in `bucket` in insertion order, oldest first.
  fn urls_in_order(&self, bucket: &str) -> Result<Vec<String>>;

  /// Names of all buckets that currently hold at least one entry.
  fn list_buckets(&self) -> Result<Vec<String>>;

  /// Drop a bucket and everything in it.
  fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

/// SQLite-backed bucket storage.
pub struct SqliteBucketStore {
  conn: Mutex<Connection>,
}

/// Schema for the cache database. The AUTOINCREMENT sequence is the FIFO
/// insertion order; INSERT OR REPLACE on (bucket, url) re-assigns it.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    bucket TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (bucket, url)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_bucket ON cache_entries(bucket, seq);
"#;

impl SqliteBucketStore {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Open an in-memory cache database for testing.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl BucketStore for SqliteBucketStore {
  fn put(&self, bucket: &str, entry: &CacheEntry) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (bucket, url, status, content_type, body, cached_at)
         VALUES (?, ?, ?, ?, ?, datetime('now'))",
        params![bucket, entry.url, entry.status, entry.content_type, entry.body],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;
    Ok(())
  }

  fn get(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT url, status, content_type, body FROM cache_entries
         WHERE bucket = ? AND url = ?",
      )
      .map_err(|e| eyre!("Failed to prepare cache lookup: {}", e))?;

    let entry = stmt
      .query_row(params![bucket, url], |row| {
        Ok(CacheEntry {
          url: row.get(0)?,
          status: row.get(1)?,
          content_type: row.get(2)?,
          body: row.get(3)?,
        })
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    Ok(entry)
  }

  fn count(&self, bucket: &str) -> Result<u64> {
    let conn = self.lock()?;
    let count: u64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE bucket = ?",
        params![bucket],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;
    Ok(count)
  }

  fn evict_oldest(&self, bucket: &str) -> Result<Option<String>> {
    let conn = self.lock()?;

    let oldest: Option<(i64, String)> = conn
      .query_row(
        "SELECT seq, url FROM cache_entries WHERE bucket = ? ORDER BY seq LIMIT 1",
        params![bucket],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to find oldest cache entry: {}", e))?;

    match oldest {
      Some((seq, url)) => {
        conn
          .execute("DELETE FROM cache_entries WHERE seq = ?", params![seq])
          .map_err(|e| eyre!("Failed to evict cache entry: {}", e))?;
        Ok(Some(url))
      }
      None => Ok(None),
    }
  }

  fn urls_in_order(&self, bucket: &str) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT url FROM cache_entries WHERE bucket = ? ORDER BY seq")
      .map_err(|e| eyre!("Failed to prepare url listing: {}", e))?;

    let urls = stmt
      .query_map(params![bucket], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache urls: {}", e))?
      .collect::<Result<Vec<String>, _>>()
      .map_err(|e| eyre!("Failed to read cache url: {}", e))?;

    Ok(urls)
  }

  fn list_buckets(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT DISTINCT bucket FROM cache_entries ORDER BY bucket")
      .map_err(|e| eyre!("Failed to prepare bucket listing: {}", e))?;

    let buckets = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?
      .collect::<Result<Vec<String>, _>>()
      .map_err(|e| eyre!("Failed to read bucket name: {}", e))?;

    Ok(buckets)
  }

  fn delete_bucket(&self, bucket: &str) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM cache_entries WHERE bucket = ?", params![bucket])
      .map_err(|e| eyre!("Failed to delete bucket: {}", e))?;
    Ok(())
  }
}
