//! Persistence capabilities consumed by the local loaders.
//!
//! Two stores are defined:
//! - [`FeedStore`] holds the whole feed as a single snapshot (replace, never merge)
//! - [`BlobStore`] holds binary payloads keyed by their source URL
//!
//! Implementations must apply mutations of a single instance in the order they
//! were submitted, and a retrieve must never observe a half-applied mutation.

mod json_file;
mod memory;
mod sqlite;

pub use json_file::JsonFileFeedStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::StoreError;
use crate::model::{CachedFeed, FeedRecord};

/// Whole-collection feed cache.
#[async_trait]
pub trait FeedStore: Send + Sync {
  /// Current snapshot, or `None` when nothing is cached.
  async fn retrieve(&self) -> Result<Option<CachedFeed>, StoreError>;

  /// Replace any existing snapshot with `records` written at `timestamp`.
  async fn insert(&self, records: Vec<FeedRecord>, timestamp: DateTime<Utc>) -> Result<(), StoreError>;

  /// Remove the snapshot. Succeeds when nothing is cached.
  async fn delete(&self) -> Result<(), StoreError>;
}

/// Keyed binary cache.
#[async_trait]
pub trait BlobStore: Send + Sync {
  /// Stored bytes for `key`, or `None` if the key was never written.
  async fn retrieve(&self, key: &Url) -> Result<Option<Vec<u8>>, StoreError>;

  /// Store `data` under `key`, overwriting any previous value.
  async fn insert(&self, data: Vec<u8>, key: &Url) -> Result<(), StoreError>;
}
