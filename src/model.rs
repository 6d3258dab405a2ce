use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A single feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
  pub id: Uuid,
  pub description: Option<String>,
  pub location: Option<String>,
  pub media_url: Url,
}

impl FeedRecord {
  pub fn new(
    id: Uuid,
    description: Option<String>,
    location: Option<String>,
    media_url: Url,
  ) -> Self {
    Self {
      id,
      description,
      location,
      media_url,
    }
  }
}

/// The whole feed cache as stored: records in order plus write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFeed {
  pub records: Vec<FeedRecord>,
  pub timestamp: DateTime<Utc>,
}
