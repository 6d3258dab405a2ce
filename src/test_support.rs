//! Spies, stubs and fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use url::Url;
use uuid::Uuid;

use crate::error::{LoadError, StoreError, TransportError};
use crate::http::{HttpClient, HttpResponse};
use crate::loader::{Cache, Loader};
use crate::model::{CachedFeed, FeedRecord};
use crate::store::{BlobStore, FeedStore};
use crate::task::{lock, Cancellable, Completion, TaskHandle};

// ============================================================================
// Fixtures
// ============================================================================

pub fn unique_url() -> Url {
  Url::parse(&format!("https://a-url.com/{}", Uuid::new_v4())).unwrap()
}

pub fn unique_record() -> FeedRecord {
  FeedRecord::new(
    Uuid::new_v4(),
    Some("a description".to_string()),
    Some("a location".to_string()),
    unique_url(),
  )
}

pub fn unique_feed() -> Vec<FeedRecord> {
  vec![
    unique_record(),
    FeedRecord::new(Uuid::new_v4(), None, None, unique_url()),
  ]
}

pub fn any_store_error() -> StoreError {
  StoreError::Unavailable("any error".to_string())
}

/// Completion that forwards into a channel, plus the receiving side.
pub fn capture<T: Send + 'static, E: Send + 'static>(
) -> (Completion<T, E>, mpsc::UnboundedReceiver<Result<T, E>>) {
  let (tx, rx) = mpsc::unbounded_channel();
  let completion: Completion<T, E> = Box::new(move |result| {
    let _ = tx.send(result);
  });
  (completion, rx)
}

/// Wait until `condition` holds, failing the test after one second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
  while !condition() {
    assert!(
      tokio::time::Instant::now() < deadline,
      "condition not met in time"
    );
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
}

/// Next delivered result, failing the test after one second.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
  tokio::time::timeout(Duration::from_secs(1), rx.recv())
    .await
    .expect("no result delivered in time")
    .expect("completion dropped without delivering")
}

/// Let spawned tasks run for a short while.
pub async fn settle() {
  tokio::time::sleep(Duration::from_millis(30)).await;
}

// ============================================================================
// Gate for holding store/client completions
// ============================================================================

struct Gate {
  open: watch::Sender<bool>,
}

impl Gate {
  fn new() -> Self {
    let (open, _) = watch::channel(true);
    Self { open }
  }

  fn hold(&self) {
    self.open.send_replace(false);
  }

  fn release(&self) {
    self.open.send_replace(true);
  }

  async fn pass(&self) {
    let mut rx = self.open.subscribe();
    let _ = rx.wait_for(|open| *open).await;
  }
}

// ============================================================================
// Loader doubles
// ============================================================================

struct NoopTask;

impl Cancellable for NoopTask {
  fn cancel(&self) {}
}

type StubResult<O> = Box<dyn Fn() -> Result<O, LoadError> + Send + Sync>;

/// Loader completing synchronously with a fixed result.
pub struct LoaderStub<I, O> {
  result: StubResult<O>,
  requests: Mutex<Vec<I>>,
}

impl<I, O: Clone + Send + Sync + 'static> LoaderStub<I, O> {
  pub fn succeeding(value: O) -> Self {
    Self {
      result: Box::new(move || Ok(value.clone())),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn failing(error: fn() -> LoadError) -> Self {
    Self {
      result: Box::new(move || Err(error())),
      requests: Mutex::new(Vec::new()),
    }
  }
}

impl<I: Clone, O> LoaderStub<I, O> {
  pub fn requests(&self) -> Vec<I> {
    lock(&self.requests).clone()
  }
}

impl<I, O> Loader for LoaderStub<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  type Input = I;
  type Output = O;
  type Error = LoadError;

  fn load(&self, input: I, completion: Completion<O, LoadError>) -> TaskHandle {
    lock(&self.requests).push(input);
    completion((self.result)());
    TaskHandle::new(Arc::new(NoopTask))
  }
}

struct SpyState<I, O> {
  requests: Vec<(I, Option<Completion<O, LoadError>>)>,
  cancelled: Vec<I>,
}

/// Loader that records requests and completes them only when told to.
pub struct LoaderSpy<I, O> {
  state: Arc<Mutex<SpyState<I, O>>>,
}

impl<I: Clone + Send + 'static, O: Send + 'static> LoaderSpy<I, O> {
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(SpyState {
        requests: Vec::new(),
        cancelled: Vec::new(),
      })),
    }
  }

  pub fn requests(&self) -> Vec<I> {
    lock(&self.state)
      .requests
      .iter()
      .map(|(input, _)| input.clone())
      .collect()
  }

  pub fn cancelled(&self) -> Vec<I> {
    lock(&self.state).cancelled.clone()
  }

  pub fn complete(&self, index: usize, result: Result<O, LoadError>) {
    let completion = lock(&self.state)
      .requests
      .get_mut(index)
      .and_then(|(_, completion)| completion.take());
    if let Some(completion) = completion {
      completion(result);
    }
  }
}

struct SpyTask<I, O> {
  state: Arc<Mutex<SpyState<I, O>>>,
  index: usize,
}

impl<I: Clone + Send, O: Send> Cancellable for SpyTask<I, O> {
  fn cancel(&self) {
    let mut state = lock(&self.state);
    let input = state.requests[self.index].0.clone();
    let completion = state.requests[self.index].1.take();
    state.cancelled.push(input);
    drop(state);
    drop(completion);
  }
}

impl<I, O> Loader for LoaderSpy<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  type Input = I;
  type Output = O;
  type Error = LoadError;

  fn load(&self, input: I, completion: Completion<O, LoadError>) -> TaskHandle {
    let index = {
      let mut state = lock(&self.state);
      state.requests.push((input, Some(completion)));
      state.requests.len() - 1
    };
    TaskHandle::new(Arc::new(SpyTask {
      state: Arc::clone(&self.state),
      index,
    }))
  }
}

/// Cache that records saves and completes immediately.
pub struct CacheSpy<I, V> {
  saves: Mutex<Vec<(V, I)>>,
  fails: bool,
}

impl<I: Clone, V: Clone> CacheSpy<I, V> {
  pub fn new() -> Self {
    Self {
      saves: Mutex::new(Vec::new()),
      fails: false,
    }
  }

  pub fn failing() -> Self {
    Self {
      saves: Mutex::new(Vec::new()),
      fails: true,
    }
  }

  pub fn saves(&self) -> Vec<(V, I)> {
    lock(&self.saves).clone()
  }
}

impl<I, V> Cache for CacheSpy<I, V>
where
  I: Send + 'static,
  V: Send + 'static,
{
  type Input = I;
  type Value = V;

  fn save(&self, value: V, input: I, completion: Completion<(), StoreError>) {
    lock(&self.saves).push((value, input));
    if self.fails {
      completion(Err(any_store_error()));
    } else {
      completion(Ok(()));
    }
  }
}

// ============================================================================
// Store doubles
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FeedStoreMessage {
  Retrieve,
  Insert(Vec<FeedRecord>, DateTime<Utc>),
  Delete,
}

#[derive(Debug, Clone)]
pub enum Retrieval {
  Empty,
  Found(CachedFeed),
  Failure,
}

/// Feed store that records messages and returns stubbed outcomes.
pub struct FeedStoreSpy {
  messages: Mutex<Vec<FeedStoreMessage>>,
  retrieval: Mutex<Retrieval>,
  insertion_fails: Mutex<bool>,
  deletion_fails: Mutex<bool>,
  gate: Gate,
}

impl FeedStoreSpy {
  pub fn new() -> Self {
    Self {
      messages: Mutex::new(Vec::new()),
      retrieval: Mutex::new(Retrieval::Empty),
      insertion_fails: Mutex::new(false),
      deletion_fails: Mutex::new(false),
      gate: Gate::new(),
    }
  }

  pub fn messages(&self) -> Vec<FeedStoreMessage> {
    lock(&self.messages).clone()
  }

  pub fn stub_retrieval(&self, retrieval: Retrieval) {
    *lock(&self.retrieval) = retrieval;
  }

  pub fn stub_insertion_failure(&self) {
    *lock(&self.insertion_fails) = true;
  }

  pub fn stub_deletion_failure(&self) {
    *lock(&self.deletion_fails) = true;
  }

  /// Hold every following operation until [`release`](Self::release).
  pub fn hold(&self) {
    self.gate.hold();
  }

  pub fn release(&self) {
    self.gate.release();
  }

  fn record(&self, message: FeedStoreMessage) {
    lock(&self.messages).push(message);
  }
}

#[async_trait]
impl FeedStore for FeedStoreSpy {
  async fn retrieve(&self) -> Result<Option<CachedFeed>, StoreError> {
    self.record(FeedStoreMessage::Retrieve);
    self.gate.pass().await;
    let retrieval = lock(&self.retrieval).clone();
    match retrieval {
      Retrieval::Empty => Ok(None),
      Retrieval::Found(cache) => Ok(Some(cache)),
      Retrieval::Failure => Err(any_store_error()),
    }
  }

  async fn insert(&self, records: Vec<FeedRecord>, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
    self.record(FeedStoreMessage::Insert(records, timestamp));
    self.gate.pass().await;
    if *lock(&self.insertion_fails) {
      return Err(any_store_error());
    }
    Ok(())
  }

  async fn delete(&self) -> Result<(), StoreError> {
    self.record(FeedStoreMessage::Delete);
    self.gate.pass().await;
    if *lock(&self.deletion_fails) {
      return Err(any_store_error());
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlobStoreMessage {
  Retrieve(Url),
  Insert(Vec<u8>, Url),
}

#[derive(Debug, Clone)]
pub enum BlobRetrieval {
  Found(Vec<u8>),
  NotFound,
  Failure,
}

/// Blob store that records messages and returns stubbed outcomes.
pub struct BlobStoreSpy {
  messages: Mutex<Vec<BlobStoreMessage>>,
  retrieval: Mutex<BlobRetrieval>,
  insertion_fails: Mutex<bool>,
  gate: Gate,
}

impl BlobStoreSpy {
  pub fn new() -> Self {
    Self {
      messages: Mutex::new(Vec::new()),
      retrieval: Mutex::new(BlobRetrieval::NotFound),
      insertion_fails: Mutex::new(false),
      gate: Gate::new(),
    }
  }

  pub fn messages(&self) -> Vec<BlobStoreMessage> {
    lock(&self.messages).clone()
  }

  pub fn stub_retrieval(&self, retrieval: BlobRetrieval) {
    *lock(&self.retrieval) = retrieval;
  }

  pub fn stub_insertion_failure(&self) {
    *lock(&self.insertion_fails) = true;
  }

  pub fn hold(&self) {
    self.gate.hold();
  }

  pub fn release(&self) {
    self.gate.release();
  }
}

#[async_trait]
impl BlobStore for BlobStoreSpy {
  async fn retrieve(&self, key: &Url) -> Result<Option<Vec<u8>>, StoreError> {
    lock(&self.messages).push(BlobStoreMessage::Retrieve(key.clone()));
    self.gate.pass().await;
    let retrieval = lock(&self.retrieval).clone();
    match retrieval {
      BlobRetrieval::Found(data) => Ok(Some(data)),
      BlobRetrieval::NotFound => Ok(None),
      BlobRetrieval::Failure => Err(any_store_error()),
    }
  }

  async fn insert(&self, data: Vec<u8>, key: &Url) -> Result<(), StoreError> {
    lock(&self.messages).push(BlobStoreMessage::Insert(data, key.clone()));
    self.gate.pass().await;
    if *lock(&self.insertion_fails) {
      return Err(any_store_error());
    }
    Ok(())
  }
}

// ============================================================================
// HTTP double
// ============================================================================

#[derive(Debug, Clone)]
pub enum ClientResponse {
  Response(u16, Vec<u8>),
  Failure,
}

/// HTTP client that records requested URLs and counts aborted requests.
pub struct HttpClientSpy {
  requests: Mutex<Vec<Url>>,
  response: Mutex<ClientResponse>,
  aborted: Arc<AtomicUsize>,
  gate: Gate,
}

impl HttpClientSpy {
  pub fn new() -> Self {
    Self {
      requests: Mutex::new(Vec::new()),
      response: Mutex::new(ClientResponse::Failure),
      aborted: Arc::new(AtomicUsize::new(0)),
      gate: Gate::new(),
    }
  }

  pub fn requests(&self) -> Vec<Url> {
    lock(&self.requests).clone()
  }

  pub fn aborted(&self) -> usize {
    self.aborted.load(Ordering::SeqCst)
  }

  pub fn stub(&self, response: ClientResponse) {
    *lock(&self.response) = response;
  }

  pub fn hold(&self) {
    self.gate.hold();
  }

  pub fn release(&self) {
    self.gate.release();
  }
}

/// Counts the request as aborted unless disarmed before drop.
struct AbortGuard {
  aborted: Arc<AtomicUsize>,
  armed: bool,
}

impl Drop for AbortGuard {
  fn drop(&mut self) {
    if self.armed {
      self.aborted.fetch_add(1, Ordering::SeqCst);
    }
  }
}

#[async_trait]
impl HttpClient for HttpClientSpy {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    lock(&self.requests).push(url.clone());
    let mut guard = AbortGuard {
      aborted: Arc::clone(&self.aborted),
      armed: true,
    };
    self.gate.pass().await;
    guard.armed = false;

    let response = lock(&self.response).clone();
    match response {
      ClientResponse::Response(status, body) => Ok(HttpResponse { status, body }),
      ClientResponse::Failure => Err(TransportError::Other("any error".to_string())),
    }
  }
}
