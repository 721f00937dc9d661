//! Network fetching seam for the offline proxy.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;

use super::entry::CacheEntry;

/// Trait for fetching a URL into a cacheable response snapshot.
///
/// The proxy is generic over this seam so tests can stand in for the
/// network; `HttpFetcher` is the real implementation.
pub trait Fetch: Send + Sync {
  fn fetch(&self, url: &str) -> impl Future<Output = Result<CacheEntry>> + Send;
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("geomoments/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Fetch for HttpFetcher {
  async fn fetch(&self, url: &str) -> Result<CacheEntry> {
    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?
      .error_for_status()
      .map_err(|e| eyre!("Request for {} failed: {}", url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?
      .to_vec();

    Ok(CacheEntry::new(url, status, content_type, body))
  }
}
