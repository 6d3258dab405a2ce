//! Feed loader backed by the local feed store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::{LoadError, StoreError};
use crate::loader::{Cache, Loader};
use crate::model::FeedRecord;
use crate::policy::CachePolicy;
use crate::store::FeedStore;
use crate::task::{Completion, InFlight, LoadTask, TaskHandle};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clock reading the system time.
pub fn system_clock() -> Clock {
  Arc::new(Utc::now)
}

/// Loads, saves and validates the cached feed.
///
/// A loaded snapshot is only returned while the [`CachePolicy`] considers it
/// fresh; a stale or missing snapshot loads as an empty feed. Dropping the
/// loader cancels everything it still has in flight.
///
/// Store work runs on the runtime the loader was created in, so operations
/// may be started from any thread.
pub struct LocalFeedLoader<S: ?Sized> {
  store: Arc<S>,
  clock: Clock,
  policy: CachePolicy,
  runtime: Handle,
  in_flight: InFlight,
}

impl<S: FeedStore + ?Sized + 'static> LocalFeedLoader<S> {
  /// # Panics
  ///
  /// Panics if called outside a Tokio runtime; use [`Self::with_runtime`]
  /// there.
  pub fn new(store: Arc<S>, clock: Clock) -> Self {
    Self::with_runtime(store, clock, Handle::current())
  }

  pub fn with_runtime(store: Arc<S>, clock: Clock, runtime: Handle) -> Self {
    Self {
      store,
      clock,
      policy: CachePolicy::default(),
      runtime,
      in_flight: InFlight::default(),
    }
  }

  /// Set the cache policy.
  pub fn with_policy(mut self, policy: CachePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn policy(&self) -> CachePolicy {
    self.policy
  }

  /// Replace the cached feed with `records`, stamped with the current time.
  ///
  /// The existing snapshot is deleted first; if that fails nothing is
  /// inserted. If the insert fails the old snapshot stays deleted.
  pub fn save(&self, records: Vec<FeedRecord>, completion: Completion<(), StoreError>) {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);

    let store = Arc::clone(&self.store);
    let clock = Arc::clone(&self.clock);
    self.runtime.spawn(async move {
      if let Err(e) = store.delete().await {
        warn!("Failed to delete cached feed before save: {}", e);
        task.complete(Err(e));
        return;
      }

      if !task.is_live() {
        debug!("Feed save abandoned after deletion");
        return;
      }

      let count = records.len();
      let result = store.insert(records, clock()).await;
      if result.is_ok() {
        debug!("Cached {} feed records", count);
      }
      task.complete(result);
    });
  }

  /// Delete the cached feed if it is stale or unreadable.
  pub fn validate_cache(&self, completion: Completion<(), StoreError>) {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);

    let store = Arc::clone(&self.store);
    let clock = Arc::clone(&self.clock);
    let policy = self.policy;
    self.runtime.spawn(async move {
      let needs_delete = match store.retrieve().await {
        Err(e) => {
          warn!("Cached feed is unreadable, deleting it: {}", e);
          true
        }
        Ok(Some(cache)) if !policy.is_valid(cache.timestamp, clock()) => {
          info!("Cached feed from {} expired, deleting it", cache.timestamp);
          true
        }
        Ok(_) => false,
      };

      if !needs_delete {
        task.complete(Ok(()));
        return;
      }
      if !task.is_live() {
        return;
      }
      task.complete(store.delete().await);
    });
  }
}

impl<S: FeedStore + ?Sized + 'static> Loader for LocalFeedLoader<S> {
  type Input = ();
  type Output = Vec<FeedRecord>;
  type Error = LoadError;

  fn load(&self, _input: (), completion: Completion<Vec<FeedRecord>, LoadError>) -> TaskHandle {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);
    let handle = task.handle();

    let store = Arc::clone(&self.store);
    let clock = Arc::clone(&self.clock);
    let policy = self.policy;
    self.runtime.spawn(async move {
      let result = match store.retrieve().await {
        Err(e) => Err(LoadError::Store(e)),
        Ok(Some(cache)) if policy.is_valid(cache.timestamp, clock()) => {
          debug!("Feed cache hit ({} records)", cache.records.len());
          Ok(cache.records)
        }
        Ok(Some(cache)) => {
          debug!("Feed cache from {} is stale", cache.timestamp);
          Ok(Vec::new())
        }
        Ok(None) => {
          debug!("Feed cache is empty");
          Ok(Vec::new())
        }
      };
      task.complete(result);
    });

    handle
  }
}

impl<S: FeedStore + ?Sized + 'static> Cache for LocalFeedLoader<S> {
  type Input = ();
  type Value = Vec<FeedRecord>;

  fn save(&self, value: Vec<FeedRecord>, _input: (), completion: Completion<(), StoreError>) {
    LocalFeedLoader::save(self, value, completion);
  }
}

impl<S: ?Sized> LocalFeedLoader<S> {
  /// Whether work issued by this loader is still running or referenced.
  pub fn has_pending(&self) -> bool {
    self.in_flight.pending() > 0
  }
}

impl<S: ?Sized> std::fmt::Debug for LocalFeedLoader<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalFeedLoader")
      .field("policy", &self.policy)
      .field("in_flight", &self.in_flight)
      .finish_non_exhaustive()
  }
}
