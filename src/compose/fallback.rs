//! Primary-then-fallback composition.

use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::loader::Loader;
use crate::task::{lock, Cancellable, Completion, TaskHandle};

/// Loads from `primary`; if that fails, loads the same input from `fallback`.
///
/// Only a primary failure triggers the fallback. A fallback failure is
/// delivered as-is. Cancelling the returned handle cancels whichever of the
/// two is in flight at that moment.
pub struct FallbackLoader<P, F> {
  primary: P,
  fallback: Arc<F>,
}

impl<P, F> FallbackLoader<P, F> {
  pub fn new(primary: P, fallback: F) -> Self {
    Self {
      primary,
      fallback: Arc::new(fallback),
    }
  }
}

#[derive(Default)]
struct SwitchState {
  cancelled: bool,
  switched: bool,
  current: Option<TaskHandle>,
}

/// Cancellation target that moves from the primary task to the fallback task.
#[derive(Default)]
struct SwitchableTask {
  state: Mutex<SwitchState>,
}

impl SwitchableTask {
  fn is_cancelled(&self) -> bool {
    lock(&self.state).cancelled
  }

  fn install_primary(&self, handle: TaskHandle) {
    let mut state = lock(&self.state);
    if state.cancelled {
      drop(state);
      handle.cancel();
    } else if !state.switched {
      state.current = Some(handle);
    }
  }

  fn install_fallback(&self, handle: TaskHandle) {
    let mut state = lock(&self.state);
    if state.cancelled {
      drop(state);
      handle.cancel();
    } else {
      state.switched = true;
      state.current = Some(handle);
    }
  }
}

impl Cancellable for SwitchableTask {
  fn cancel(&self) {
    let current = {
      let mut state = lock(&self.state);
      state.cancelled = true;
      state.current.take()
    };
    if let Some(current) = current {
      current.cancel();
    }
  }
}

impl<P, F> Loader for FallbackLoader<P, F>
where
  P: Loader,
  F: Loader<Input = P::Input, Output = P::Output, Error = P::Error> + 'static,
{
  type Input = P::Input;
  type Output = P::Output;
  type Error = P::Error;

  fn load(
    &self,
    input: Self::Input,
    completion: Completion<Self::Output, Self::Error>,
  ) -> TaskHandle {
    let switch = Arc::new(SwitchableTask::default());
    let fallback = Arc::downgrade(&self.fallback);
    let fallback_input = input.clone();
    let target = Arc::clone(&switch);

    let primary = self.primary.load(
      input,
      Box::new(move |result| {
        if target.is_cancelled() {
          return;
        }
        match result {
          Ok(value) => completion(Ok(value)),
          Err(_) => {
            let Some(fallback) = fallback.upgrade() else {
              debug!("Fallback loader released before primary failed");
              return;
            };
            debug!("Primary load failed, trying fallback");
            let guard = Arc::clone(&target);
            let handle = fallback.load(
              fallback_input,
              Box::new(move |result| {
                if !guard.is_cancelled() {
                  completion(result);
                }
              }),
            );
            target.install_fallback(handle);
          }
        }
      }),
    );
    switch.install_primary(primary);

    TaskHandle::new(switch)
  }
}
