//! Write-through caching of successful loads.

use std::sync::Arc;
use tracing::warn;

use crate::loader::{Cache, Loader};
use crate::task::{Completion, TaskHandle};

/// Saves every successful result of `decoratee` into `cache`, then delivers it.
///
/// The save is fire-and-forget: its outcome never changes what the caller
/// receives. Failures are not saved.
pub struct CachingLoader<L, C> {
  decoratee: L,
  cache: Arc<C>,
}

impl<L, C> CachingLoader<L, C> {
  pub fn new(decoratee: L, cache: C) -> Self {
    Self {
      decoratee,
      cache: Arc::new(cache),
    }
  }
}

impl<L, C> Loader for CachingLoader<L, C>
where
  L: Loader,
  L::Output: Clone,
  C: Cache<Input = L::Input, Value = L::Output> + 'static,
{
  type Input = L::Input;
  type Output = L::Output;
  type Error = L::Error;

  fn load(
    &self,
    input: Self::Input,
    completion: Completion<Self::Output, Self::Error>,
  ) -> TaskHandle {
    let cache = Arc::clone(&self.cache);
    let key = input.clone();
    self.decoratee.load(
      input,
      Box::new(move |result| {
        if let Ok(value) = &result {
          cache.save(
            value.clone(),
            key,
            Box::new(|outcome| {
              if let Err(e) = outcome {
                warn!("Failed to cache loaded value: {}", e);
              }
            }),
          );
        }
        completion(result);
      }),
    )
  }
}
