//! Feed store persisted as a single JSON file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::FeedStore;
use crate::error::StoreError;
use crate::model::{CachedFeed, FeedRecord};

/// Feed store writing the snapshot to one JSON file.
///
/// Reads share the lock and writes take it exclusively; the lock is fair, so
/// writes apply in the order they were requested. Each write goes to a temp
/// file that is renamed over the previous snapshot.
#[derive(Debug)]
pub struct JsonFileFeedStore {
  path: PathBuf,
  lock: RwLock<()>,
}

impl JsonFileFeedStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: RwLock::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn temp_path(&self) -> PathBuf {
    let mut name = self
      .path
      .file_name()
      .map(|n| n.to_os_string())
      .unwrap_or_default();
    name.push(".tmp");
    self.path.with_file_name(name)
  }
}

#[async_trait]
impl FeedStore for JsonFileFeedStore {
  async fn retrieve(&self) -> Result<Option<CachedFeed>, StoreError> {
    let _guard = self.lock.read().await;

    let data = match tokio::fs::read(&self.path).await {
      Ok(data) => data,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let cache: CachedFeed = serde_json::from_slice(&data)?;
    Ok(Some(cache))
  }

  async fn insert(&self, records: Vec<FeedRecord>, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
    let _guard = self.lock.write().await;

    let encoded = serde_json::to_vec(&CachedFeed { records, timestamp })?;
    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    let temp = self.temp_path();
    tokio::fs::write(&temp, &encoded).await?;
    tokio::fs::rename(&temp, &self.path).await?;

    debug!("Wrote {} bytes to {}", encoded.len(), self.path.display());
    Ok(())
  }

  async fn delete(&self) -> Result<(), StoreError> {
    let _guard = self.lock.write().await;

    match tokio::fs::remove_file(&self.path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
