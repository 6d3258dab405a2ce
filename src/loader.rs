//! Loader and cache capabilities shared by every data type.
//!
//! Both feed and blob pipelines are expressed through the same two traits, so
//! the fallback and caching compositions are written once.

use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

use crate::error::{LoadError, StoreError};
use crate::model::FeedRecord;
use crate::task::{Completion, TaskHandle};

/// Something that asynchronously produces a value for an input.
///
/// The completion is invoked at most once, and never after the returned
/// handle has been cancelled.
pub trait Loader: Send + Sync {
  type Input: Clone + Send + 'static;
  type Output: Send + 'static;
  type Error: Send + 'static;

  fn load(
    &self,
    input: Self::Input,
    completion: Completion<Self::Output, Self::Error>,
  ) -> TaskHandle;
}

/// Something that persists a loaded value for the input it was loaded with.
pub trait Cache: Send + Sync {
  type Input: Send + 'static;
  type Value: Send + 'static;

  fn save(&self, value: Self::Value, input: Self::Input, completion: Completion<(), StoreError>);
}

impl<L: Loader + ?Sized> Loader for Arc<L> {
  type Input = L::Input;
  type Output = L::Output;
  type Error = L::Error;

  fn load(
    &self,
    input: Self::Input,
    completion: Completion<Self::Output, Self::Error>,
  ) -> TaskHandle {
    (**self).load(input, completion)
  }
}

impl<C: Cache + ?Sized> Cache for Arc<C> {
  type Input = C::Input;
  type Value = C::Value;

  fn save(&self, value: Self::Value, input: Self::Input, completion: Completion<(), StoreError>) {
    (**self).save(value, input, completion)
  }
}

/// Shared feed loader.
pub type DynFeedLoader = Arc<dyn Loader<Input = (), Output = Vec<FeedRecord>, Error = LoadError>>;

/// Shared blob loader keyed by URL.
pub type DynBlobLoader = Arc<dyn Loader<Input = Url, Output = Vec<u8>, Error = LoadError>>;

/// Await a single load. Returns `None` if the task was cancelled before
/// delivering (for example because the loader was dropped).
pub async fn load<L>(loader: &L, input: L::Input) -> Option<Result<L::Output, L::Error>>
where
  L: Loader + ?Sized,
{
  let (tx, rx) = oneshot::channel();
  let _task = loader.load(
    input,
    Box::new(move |result| {
      // Ignore send errors - the awaiting side may have been dropped
      let _ = tx.send(result);
    }),
  );
  rx.await.ok()
}
