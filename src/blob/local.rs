//! Blob loader backed by the local blob store.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use url::Url;

use crate::error::{LoadError, StoreError};
use crate::loader::{Cache, Loader};
use crate::store::BlobStore;
use crate::task::{Completion, InFlight, LoadTask, TaskHandle};

/// Loads and saves cached blobs keyed by their source URL.
///
/// A miss loads as [`LoadError::NotFound`], a store failure as
/// [`LoadError::Failed`]. Store work runs on the runtime the loader was
/// created in, so saves may be started from any thread.
pub struct LocalBlobLoader<S: ?Sized> {
  store: Arc<S>,
  runtime: Handle,
  in_flight: InFlight,
}

impl<S: BlobStore + ?Sized + 'static> LocalBlobLoader<S> {
  /// # Panics
  ///
  /// Panics if called outside a Tokio runtime; use [`Self::with_runtime`]
  /// there.
  pub fn new(store: Arc<S>) -> Self {
    Self::with_runtime(store, Handle::current())
  }

  pub fn with_runtime(store: Arc<S>, runtime: Handle) -> Self {
    Self {
      store,
      runtime,
      in_flight: InFlight::default(),
    }
  }

  /// Store `data` for `url`. The outcome is reported to `completion` only.
  pub fn save(&self, data: Vec<u8>, url: Url, completion: Completion<(), StoreError>) {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);

    let store = Arc::clone(&self.store);
    self.runtime.spawn(async move {
      let result = store.insert(data, &url).await;
      if let Err(e) = &result {
        warn!("Failed to cache data for {}: {}", url, e);
      }
      task.complete(result);
    });
  }
}

impl<S: BlobStore + ?Sized + 'static> Loader for LocalBlobLoader<S> {
  type Input = Url;
  type Output = Vec<u8>;
  type Error = LoadError;

  fn load(&self, url: Url, completion: Completion<Vec<u8>, LoadError>) -> TaskHandle {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);
    let handle = task.handle();

    let store = Arc::clone(&self.store);
    self.runtime.spawn(async move {
      let result = match store.retrieve(&url).await {
        Ok(Some(data)) => Ok(data),
        Ok(None) => {
          debug!("No cached data for {}", url);
          Err(LoadError::NotFound)
        }
        Err(e) => Err(LoadError::Failed(e)),
      };
      task.complete(result);
    });

    handle
  }
}

impl<S: BlobStore + ?Sized + 'static> Cache for LocalBlobLoader<S> {
  type Input = Url;
  type Value = Vec<u8>;

  fn save(&self, value: Vec<u8>, input: Url, completion: Completion<(), StoreError>) {
    LocalBlobLoader::save(self, value, input, completion);
  }
}

impl<S: ?Sized> LocalBlobLoader<S> {
  /// Whether work issued by this loader is still running or referenced.
  pub fn has_pending(&self) -> bool {
    self.in_flight.pending() > 0
  }
}

impl<S: ?Sized> std::fmt::Debug for LocalBlobLoader<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalBlobLoader")
      .field("in_flight", &self.in_flight)
      .finish_non_exhaustive()
  }
}
