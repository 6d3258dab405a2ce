//! Transport boundary used by the remote loaders.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub const OK: u16 = 200;

  pub fn is_ok(&self) -> bool {
    self.status == Self::OK
  }
}

/// Fetches a URL.
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
  client: reqwest::Client,
}

impl ReqwestHttpClient {
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("feedcache/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self { client })
  }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    debug!("GET {}", url);
    let response = self.client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    debug!("GET {} -> {} ({} bytes)", url, status, body.len());

    Ok(HttpResponse { status, body })
  }
}
