//! SQLite-backed feed and blob store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::mpsc;
use tokio::sync::oneshot;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::{BlobStore, FeedStore};
use crate::error::StoreError;
use crate::model::{CachedFeed, FeedRecord};

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

/// SQLite-based store implementing both [`FeedStore`] and [`BlobStore`].
///
/// The connection is owned by a single worker thread which runs operations in
/// the order they were submitted, so mutations of one store instance never
/// interleave.
pub struct SqliteStore {
  jobs: mpsc::Sender<Job>,
  location: String,
}

impl SqliteStore {
  /// Open (or create) the database at `path`.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::start(conn, path.display().to_string())
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::start(Connection::open_in_memory()?, ":memory:".to_string())
  }

  fn start(conn: Connection, location: String) -> Result<Self, StoreError> {
    conn.execute_batch(CACHE_SCHEMA)?;

    let (jobs, rx) = mpsc::channel::<Job>();
    let worker_location = location.clone();
    std::thread::Builder::new()
      .name("feedcache-sqlite".to_string())
      .spawn(move || {
        let mut conn = conn;
        debug!("sqlite worker started for {}", worker_location);
        for job in rx {
          job(&mut conn);
        }
        debug!("sqlite worker stopped for {}", worker_location);
      })?;

    info!("Opened cache database at {}", location);
    Ok(Self { jobs, location })
  }

  /// Run `f` on the worker thread and wait for its result.
  async fn execute<R, F>(&self, f: F) -> Result<R, StoreError>
  where
    R: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<R, StoreError> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    self
      .jobs
      .send(Box::new(move |conn| {
        // Ignore send errors - the caller may have given up waiting
        let _ = tx.send(f(conn));
      }))
      .map_err(|_| StoreError::Unavailable("sqlite worker stopped".to_string()))?;

    rx.await
      .map_err(|_| StoreError::Unavailable("sqlite worker dropped the request".to_string()))?
  }
}

impl std::fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteStore")
      .field("location", &self.location)
      .finish_non_exhaustive()
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Single feed snapshot (at most one row)
CREATE TABLE IF NOT EXISTS feed_cache (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    timestamp TEXT NOT NULL
);

-- Snapshot records (preserves order)
CREATE TABLE IF NOT EXISTS feed_records (
    position INTEGER PRIMARY KEY,
    id TEXT NOT NULL,
    description TEXT,
    location TEXT,
    media_url TEXT NOT NULL
);

-- Binary payloads keyed by the hash of their source URL
CREATE TABLE IF NOT EXISTS blob_cache (
    key_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

#[async_trait]
impl FeedStore for SqliteStore {
  async fn retrieve(&self) -> Result<Option<CachedFeed>, StoreError> {
    self.execute(read_snapshot).await
  }

  async fn insert(&self, records: Vec<FeedRecord>, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
    self
      .execute(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM feed_records", [])?;
        tx.execute("DELETE FROM feed_cache", [])?;
        tx.execute(
          "INSERT INTO feed_cache (id, timestamp) VALUES (1, ?1)",
          params![format_timestamp(timestamp)],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO feed_records (position, id, description, location, media_url)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (position, record) in records.iter().enumerate() {
            stmt.execute(params![
              position as i64,
              record.id.to_string(),
              record.description,
              record.location,
              record.media_url.as_str(),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn delete(&self) -> Result<(), StoreError> {
    self
      .execute(|conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM feed_records", [])?;
        tx.execute("DELETE FROM feed_cache", [])?;
        tx.commit()?;
        Ok(())
      })
      .await
  }
}

#[async_trait]
impl BlobStore for SqliteStore {
  async fn retrieve(&self, key: &Url) -> Result<Option<Vec<u8>>, StoreError> {
    let key_hash = blob_key(key);
    self
      .execute(move |conn| {
        let data = conn
          .query_row(
            "SELECT data FROM blob_cache WHERE key_hash = ?1",
            params![key_hash],
            |row| row.get::<_, Vec<u8>>(0),
          )
          .optional()?;
        Ok(data)
      })
      .await
  }

  async fn insert(&self, data: Vec<u8>, key: &Url) -> Result<(), StoreError> {
    let key_hash = blob_key(key);
    let url = key.to_string();
    self
      .execute(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO blob_cache (key_hash, url, data, cached_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![key_hash, url, data, format_timestamp(Utc::now())],
        )?;
        Ok(())
      })
      .await
  }
}

fn read_snapshot(conn: &mut Connection) -> Result<Option<CachedFeed>, StoreError> {
  let timestamp: Option<String> = conn
    .query_row("SELECT timestamp FROM feed_cache WHERE id = 1", [], |row| {
      row.get(0)
    })
    .optional()?;

  let timestamp = match timestamp {
    Some(ts) => parse_timestamp(&ts)?,
    None => return Ok(None),
  };

  let mut stmt = conn.prepare(
    "SELECT id, description, location, media_url FROM feed_records ORDER BY position",
  )?;
  let rows = stmt.query_map([], |row| {
    Ok((
      row.get::<_, String>(0)?,
      row.get::<_, Option<String>>(1)?,
      row.get::<_, Option<String>>(2)?,
      row.get::<_, String>(3)?,
    ))
  })?;

  let mut records = Vec::new();
  for row in rows {
    let (id, description, location, media_url) = row?;
    let id = Uuid::parse_str(&id)
      .map_err(|e| StoreError::Corrupt(format!("invalid record id '{}': {}", id, e)))?;
    let media_url = Url::parse(&media_url)
      .map_err(|e| StoreError::Corrupt(format!("invalid media url '{}': {}", media_url, e)))?;
    records.push(FeedRecord::new(id, description, location, media_url));
  }

  Ok(Some(CachedFeed { records, timestamp }))
}

/// Stable fixed-length key for a blob URL.
fn blob_key(url: &Url) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_str().as_bytes());
  hex::encode(hasher.finalize())
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
  timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{}': {}", s, e)))
}
