//! In-memory store used for the `memory` backend and in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::Url;

use super::{BlobStore, FeedStore};
use crate::error::StoreError;
use crate::model::{CachedFeed, FeedRecord};

#[derive(Debug, Default)]
struct State {
  feed: Option<CachedFeed>,
  blobs: HashMap<Url, Vec<u8>>,
}

/// Feed and blob store kept in process memory.
///
/// The fair async mutex hands out access in request order, which keeps
/// mutations in submission order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
  state: Mutex<State>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl FeedStore for InMemoryStore {
  async fn retrieve(&self) -> Result<Option<CachedFeed>, StoreError> {
    Ok(self.state.lock().await.feed.clone())
  }

  async fn insert(&self, records: Vec<FeedRecord>, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
    self.state.lock().await.feed = Some(CachedFeed { records, timestamp });
    Ok(())
  }

  async fn delete(&self) -> Result<(), StoreError> {
    self.state.lock().await.feed = None;
    Ok(())
  }
}

#[async_trait]
impl BlobStore for InMemoryStore {
  async fn retrieve(&self, key: &Url) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(self.state.lock().await.blobs.get(key).cloned())
  }

  async fn insert(&self, data: Vec<u8>, key: &Url) -> Result<(), StoreError> {
    self.state.lock().await.blobs.insert(key.clone(), data);
    Ok(())
  }
}
