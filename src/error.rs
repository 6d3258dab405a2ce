//! Error taxonomy shared by stores, loaders and the HTTP boundary.

use thiserror::Error;

/// The persistence medium failed.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Stored data could not be mapped back into records.
  #[error("corrupt cache entry: {0}")]
  Corrupt(String),

  /// The store's worker or lock is gone.
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Failure of the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("{0}")]
  Other(String),
}

/// Failure delivered to a load completion.
#[derive(Debug, Error)]
pub enum LoadError {
  /// Feed cache retrieval failed; surfaced as-is.
  #[error("cache store failed: {0}")]
  Store(#[from] StoreError),

  /// Blob cache medium failed.
  #[error("blob cache retrieval failed: {0}")]
  Failed(#[source] StoreError),

  /// Blob cache has no entry for the key.
  #[error("no cached data for key")]
  NotFound,

  /// Origin unreachable.
  #[error("connectivity error")]
  Connectivity,

  /// Origin responded but the content is unusable.
  #[error("invalid data received")]
  InvalidData,
}
