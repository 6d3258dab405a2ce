//! Feed loader fetching from the origin server.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;
use url::Url;

use super::mapper;
use crate::error::LoadError;
use crate::http::HttpClient;
use crate::loader::Loader;
use crate::model::FeedRecord;
use crate::task::{Completion, InFlight, LoadTask, TaskHandle};

/// Fetches the feed from a fixed URL.
pub struct RemoteFeedLoader<C: ?Sized> {
  url: Url,
  client: Arc<C>,
  runtime: Handle,
  in_flight: InFlight,
}

impl<C: HttpClient + ?Sized + 'static> RemoteFeedLoader<C> {
  /// Requests run on the current Tokio runtime; panics outside one.
  pub fn new(url: Url, client: Arc<C>) -> Self {
    Self::with_runtime(url, client, Handle::current())
  }

  pub fn with_runtime(url: Url, client: Arc<C>, runtime: Handle) -> Self {
    Self {
      url,
      client,
      runtime,
      in_flight: InFlight::default(),
    }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl<C: HttpClient + ?Sized + 'static> Loader for RemoteFeedLoader<C> {
  type Input = ();
  type Output = Vec<FeedRecord>;
  type Error = LoadError;

  fn load(&self, _input: (), completion: Completion<Vec<FeedRecord>, LoadError>) -> TaskHandle {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);
    let handle = task.handle();

    let client = Arc::clone(&self.client);
    let url = self.url.clone();
    let pending = Arc::clone(&task);
    let join = self.runtime.spawn(async move {
      let result = match client.get(&url).await {
        Ok(response) => mapper::map(&response),
        Err(e) => {
          warn!("Feed request to {} failed: {}", url, e);
          Err(LoadError::Connectivity)
        }
      };
      pending.complete(result);
    });
    task.attach(join.abort_handle());

    handle
  }
}

impl<C: ?Sized> std::fmt::Debug for RemoteFeedLoader<C> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RemoteFeedLoader")
      .field("url", &self.url)
      .finish_non_exhaustive()
  }
}
