//! Cancellable task handles for callback-based loads.
//!
//! Every load hands its completion to a [`LoadTask`]. The task, not the loader,
//! owns the suppression state: once a task is cancelled (directly through its
//! [`TaskHandle`], or because the owning loader was dropped) the completion is
//! released and can never run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::AbortHandle;

/// Callback receiving the single result of an asynchronous operation.
pub type Completion<T, E> = Box<dyn FnOnce(Result<T, E>) + Send + 'static>;

/// Something that can be cancelled. Cancelling must be idempotent.
pub trait Cancellable: Send + Sync {
  fn cancel(&self);
}

/// Opaque cancellation token returned by every load.
#[derive(Clone)]
pub struct TaskHandle {
  inner: Arc<dyn Cancellable>,
}

impl TaskHandle {
  pub fn new(inner: Arc<dyn Cancellable>) -> Self {
    Self { inner }
  }

  /// Cancel the task. Safe to call repeatedly or after completion.
  ///
  /// Suppresses any delivery that has not started yet. A delivery already in
  /// progress on another thread is not interrupted.
  pub fn cancel(&self) {
    self.inner.cancel();
  }
}

impl fmt::Debug for TaskHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskHandle").finish_non_exhaustive()
  }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a pending completion until it is delivered or cancelled.
pub(crate) struct LoadTask<T, E> {
  completion: Mutex<Option<Completion<T, E>>>,
  abort: Mutex<Option<AbortHandle>>,
  cancelled: AtomicBool,
}

impl<T: Send + 'static, E: Send + 'static> LoadTask<T, E> {
  pub(crate) fn new(completion: Completion<T, E>) -> Arc<Self> {
    Arc::new(Self {
      completion: Mutex::new(Some(completion)),
      abort: Mutex::new(None),
      cancelled: AtomicBool::new(false),
    })
  }

  /// Deliver `result` if the task is still live. Returns whether it was delivered.
  ///
  /// The completion is claimed under the lock and invoked after releasing it.
  /// Once claimed, delivery is committed: a `cancel` racing it returns
  /// immediately and the completion still runs to the end. Completions may
  /// therefore cancel their own task without deadlocking.
  pub(crate) fn complete(&self, result: Result<T, E>) -> bool {
    let completion = lock(&self.completion).take();
    match completion {
      Some(completion) => {
        completion(result);
        true
      }
      None => false,
    }
  }

  /// Whether the completion can still be delivered.
  pub(crate) fn is_live(&self) -> bool {
    lock(&self.completion).is_some()
  }

  /// Tie a spawned future to this task so that cancelling aborts it.
  pub(crate) fn attach(&self, abort: AbortHandle) {
    let mut slot = lock(&self.abort);
    if self.cancelled.load(Ordering::Acquire) {
      abort.abort();
    } else {
      *slot = Some(abort);
    }
  }

  pub(crate) fn handle(self: &Arc<Self>) -> TaskHandle {
    TaskHandle::new(Arc::clone(self) as Arc<dyn Cancellable>)
  }
}

impl<T: Send + 'static, E: Send + 'static> Cancellable for LoadTask<T, E> {
  fn cancel(&self) {
    let abort = {
      let mut slot = lock(&self.abort);
      self.cancelled.store(true, Ordering::Release);
      slot.take()
    };
    // Dropped outside the lock: the closure may own arbitrary state.
    let completion = lock(&self.completion).take();
    drop(completion);
    if let Some(abort) = abort {
      abort.abort();
    }
  }
}

/// Registry of the tasks a loader has issued. Dropping it cancels every task
/// still registered, so a released loader never delivers.
#[derive(Default)]
pub(crate) struct InFlight {
  tasks: Mutex<Vec<Weak<dyn Cancellable>>>,
}

impl InFlight {
  pub(crate) fn track<C: Cancellable + 'static>(&self, task: &Arc<C>) {
    let task: Arc<dyn Cancellable> = Arc::clone(task) as Arc<dyn Cancellable>;
    let mut tasks = lock(&self.tasks);
    tasks.retain(|t| t.strong_count() > 0);
    tasks.push(Arc::downgrade(&task));
  }

  /// Number of tasks still held by a running job or an outstanding handle.
  pub(crate) fn pending(&self) -> usize {
    lock(&self.tasks)
      .iter()
      .filter(|t| t.strong_count() > 0)
      .count()
  }
}

impl Drop for InFlight {
  fn drop(&mut self) {
    let tasks = std::mem::take(&mut *lock(&self.tasks));
    for task in tasks.iter().filter_map(Weak::upgrade) {
      task.cancel();
    }
  }
}

impl fmt::Debug for InFlight {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InFlight")
      .field("tasks", &lock(&self.tasks).len())
      .finish()
  }
}
