//! Serde-deserializable types matching the remote feed payload.
//!
//! These are kept apart from [`FeedRecord`] so the wire shape can change
//! without touching the cached model.

use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::error::LoadError;
use crate::http::HttpResponse;
use crate::model::FeedRecord;

#[derive(Debug, Deserialize)]
struct ApiFeed {
  items: Vec<ApiFeedItem>,
}

#[derive(Debug, Deserialize)]
struct ApiFeedItem {
  id: Uuid,
  description: Option<String>,
  location: Option<String>,
  image: Url,
}

impl From<ApiFeedItem> for FeedRecord {
  fn from(item: ApiFeedItem) -> Self {
    FeedRecord::new(item.id, item.description, item.location, item.image)
  }
}

/// Map a feed response into records. Anything but a decodable 200 is invalid.
pub fn map(response: &HttpResponse) -> Result<Vec<FeedRecord>, LoadError> {
  if !response.is_ok() {
    return Err(LoadError::InvalidData);
  }

  let feed: ApiFeed = serde_json::from_slice(&response.body).map_err(|_| LoadError::InvalidData)?;
  Ok(feed.items.into_iter().map(FeedRecord::from).collect())
}
