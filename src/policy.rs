//! Cache age policy.

use chrono::{DateTime, Duration, Utc};

/// Decides whether a cached snapshot is still usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  max_age: Duration,
}

impl CachePolicy {
  pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

  pub fn new(max_age: Duration) -> Self {
    Self { max_age }
  }

  pub fn max_age(&self) -> Duration {
    self.max_age
  }

  /// Valid strictly before `timestamp + max_age`.
  pub fn is_valid(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match timestamp.checked_add_signed(self.max_age) {
      Some(expires_at) => now < expires_at,
      None => false,
    }
  }
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self::new(Duration::days(Self::DEFAULT_MAX_AGE_DAYS))
  }
}
