//! Wires stores, loaders and compositions from configuration.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::blob::{LocalBlobLoader, RemoteBlobLoader};
use crate::compose::{CachingLoader, FallbackLoader};
use crate::config::{Backend, CacheConfig, Config, Strategy};
use crate::error::StoreError;
use crate::feed::{system_clock, Clock, LocalFeedLoader, RemoteFeedLoader};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::loader::{Cache, DynBlobLoader, DynFeedLoader, Loader};
use crate::store::{BlobStore, FeedStore, InMemoryStore, JsonFileFeedStore, SqliteStore};

/// Feed and blob stores backing a pipeline.
#[derive(Clone)]
pub struct Stores {
  pub feed: Arc<dyn FeedStore>,
  pub blobs: Arc<dyn BlobStore>,
}

impl Stores {
  /// Open the backend named in `cache`.
  pub fn open(cache: &CacheConfig) -> Result<Self, StoreError> {
    match cache.backend {
      Backend::Memory => {
        let store = Arc::new(InMemoryStore::new());
        Ok(Self {
          feed: store.clone(),
          blobs: store,
        })
      }
      Backend::Sqlite => {
        let path = cache
          .resolved_path()
          .ok_or_else(|| StoreError::Unavailable("no data directory for the cache".to_string()))?;
        info!("Using SQLite cache at {}", path.display());
        let store = Arc::new(SqliteStore::open(&path)?);
        Ok(Self {
          feed: store.clone(),
          blobs: store,
        })
      }
      Backend::Json => {
        let path = cache
          .resolved_path()
          .ok_or_else(|| StoreError::Unavailable("no data directory for the cache".to_string()))?;
        let blob_path = path.with_file_name("blobs.db");
        info!(
          "Using JSON feed cache at {} and blob cache at {}",
          path.display(),
          blob_path.display()
        );
        Ok(Self {
          feed: Arc::new(JsonFileFeedStore::new(path)),
          blobs: Arc::new(SqliteStore::open(&blob_path)?),
        })
      }
    }
  }
}

/// The composed feed and image loaders plus the pieces the commands need.
pub struct Pipeline {
  feed: Option<DynFeedLoader>,
  images: DynBlobLoader,
  local_feed: Arc<LocalFeedLoader<dyn FeedStore>>,
  local_images: Arc<LocalBlobLoader<dyn BlobStore>>,
  feed_store: Arc<dyn FeedStore>,
}

impl Pipeline {
  /// Open the configured stores and HTTP client and compose both pipelines.
  ///
  /// Without a feed URL only the image pipeline and the cache maintenance
  /// operations are available.
  pub fn build(config: &Config, feed_url: Option<Url>) -> Result<Self> {
    let stores = Stores::open(&config.cache)?;
    let client = ReqwestHttpClient::new(config.http.timeout())
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Self::with_parts(config, feed_url, stores, Arc::new(client), system_clock())
  }

  /// Compose the pipelines from already opened parts. Fails on an invalid
  /// cache policy.
  pub fn with_parts(
    config: &Config,
    feed_url: Option<Url>,
    stores: Stores,
    client: Arc<dyn HttpClient>,
    clock: Clock,
  ) -> Result<Self> {
    let policy = config.cache.policy()?;
    let local_feed: Arc<LocalFeedLoader<dyn FeedStore>> =
      Arc::new(LocalFeedLoader::new(Arc::clone(&stores.feed), clock).with_policy(policy));
    let local_images: Arc<LocalBlobLoader<dyn BlobStore>> =
      Arc::new(LocalBlobLoader::new(Arc::clone(&stores.blobs)));

    debug!(
      "Composing feed pipeline ({:?}) and image pipeline ({:?})",
      config.strategy.feed, config.strategy.images
    );
    let feed = feed_url.map(|url| {
      compose(
        config.strategy.feed,
        RemoteFeedLoader::new(url, Arc::clone(&client)),
        Arc::clone(&local_feed),
      )
    });
    let images = compose(
      config.strategy.images,
      RemoteBlobLoader::new(client),
      Arc::clone(&local_images),
    );

    Ok(Self {
      feed,
      images,
      local_feed,
      local_images,
      feed_store: stores.feed,
    })
  }

  /// The composed feed loader, if a feed URL was configured.
  pub fn feed(&self) -> Option<&DynFeedLoader> {
    self.feed.as_ref()
  }

  pub fn images(&self) -> &DynBlobLoader {
    &self.images
  }

  pub fn local_feed(&self) -> &Arc<LocalFeedLoader<dyn FeedStore>> {
    &self.local_feed
  }

  /// Delete the cached feed if it is stale or unreadable.
  pub async fn validate_cache(&self) -> Result<(), StoreError> {
    let (tx, rx) = oneshot::channel();
    self.local_feed.validate_cache(Box::new(move |result| {
      let _ = tx.send(result);
    }));
    rx.await
      .map_err(|_| StoreError::Unavailable("validation was cancelled".to_string()))?
  }

  /// Delete the cached feed unconditionally.
  pub async fn clear(&self) -> Result<(), StoreError> {
    self.feed_store.delete().await
  }

  /// Wait for cache writes started by earlier loads, up to `timeout`.
  ///
  /// Returns whether everything finished in time.
  pub async fn flush(&self, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while self.local_feed.has_pending() || self.local_images.has_pending() {
      if tokio::time::Instant::now() >= deadline {
        warn!("Cache writes still pending after {:?}", timeout);
        return false;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
  }
}

type DynLoader<R> =
  Arc<dyn Loader<Input = <R as Loader>::Input, Output = <R as Loader>::Output, Error = <R as Loader>::Error>>;

/// Combine a remote loader with the local loader that also acts as its cache.
fn compose<R, L>(strategy: Strategy, remote: R, local: Arc<L>) -> DynLoader<R>
where
  R: Loader + 'static,
  R::Output: Clone,
  L: Loader<Input = R::Input, Output = R::Output, Error = R::Error>
    + Cache<Input = R::Input, Value = R::Output>
    + 'static,
{
  match strategy {
    Strategy::RemoteFirst => Arc::new(FallbackLoader::new(
      CachingLoader::new(remote, Arc::clone(&local)),
      local,
    )),
    Strategy::LocalFirst => Arc::new(FallbackLoader::new(
      Arc::clone(&local),
      CachingLoader::new(remote, local),
    )),
  }
}
