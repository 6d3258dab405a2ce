//! Blob loader fetching payloads from their source URL.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;
use url::Url;

use crate::error::LoadError;
use crate::http::HttpClient;
use crate::loader::Loader;
use crate::task::{Completion, InFlight, LoadTask, TaskHandle};

/// Fetches binary payloads. Only a non-empty 200 response is accepted.
pub struct RemoteBlobLoader<C: ?Sized> {
  client: Arc<C>,
  runtime: Handle,
  in_flight: InFlight,
}

impl<C: HttpClient + ?Sized + 'static> RemoteBlobLoader<C> {
  /// Requests run on the current Tokio runtime; panics outside one.
  pub fn new(client: Arc<C>) -> Self {
    Self::with_runtime(client, Handle::current())
  }

  pub fn with_runtime(client: Arc<C>, runtime: Handle) -> Self {
    Self {
      client,
      runtime,
      in_flight: InFlight::default(),
    }
  }
}

impl<C: HttpClient + ?Sized + 'static> Loader for RemoteBlobLoader<C> {
  type Input = Url;
  type Output = Vec<u8>;
  type Error = LoadError;

  fn load(&self, url: Url, completion: Completion<Vec<u8>, LoadError>) -> TaskHandle {
    let task = LoadTask::new(completion);
    self.in_flight.track(&task);
    let handle = task.handle();

    let client = Arc::clone(&self.client);
    let pending = Arc::clone(&task);
    let join = self.runtime.spawn(async move {
      let result = match client.get(&url).await {
        Ok(response) if response.is_ok() && !response.body.is_empty() => Ok(response.body),
        Ok(response) => {
          warn!(
            "Unusable response for {}: status {}, {} bytes",
            url,
            response.status,
            response.body.len()
          );
          Err(LoadError::InvalidData)
        }
        Err(e) => {
          warn!("Request to {} failed: {}", url, e);
          Err(LoadError::Connectivity)
        }
      };
      pending.complete(result);
    });
    task.attach(join.abort_handle());

    handle
  }
}

impl<C: ?Sized> std::fmt::Debug for RemoteBlobLoader<C> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RemoteBlobLoader")
      .field("in_flight", &self.in_flight)
      .finish_non_exhaustive()
  }
}
