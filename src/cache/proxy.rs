//! Offline-first request routing over the bucket cache.
//!
//! Mirrors a service-worker lifecycle: `install` populates the versioned
//! static bucket from the app shell manifest, `activate` purges buckets
//! from older versions, and `handle` routes individual requests between
//! cache and network, policing the dynamic bucket's FIFO bound.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CacheConfig;

use super::entry::{BucketNames, CacheEntry, ProxyRequest, RouteOutcome, ServedFrom};
use super::fetch::Fetch;
use super::storage::BucketStore;

pub struct OfflineProxy<S: BucketStore, F: Fetch> {
  storage: Arc<S>,
  fetcher: F,
  buckets: BucketNames,
  /// App shell manifest; fully cached at install time.
  manifest: Vec<String>,
  /// Cached document served to offline navigation requests.
  shell_url: String,
  /// Host suffixes treated as map tile servers.
  tile_hosts: Vec<String>,
  max_dynamic_entries: u64,
}

impl<S: BucketStore, F: Fetch> OfflineProxy<S, F> {
  pub fn new(storage: S, fetcher: F, config: &CacheConfig) -> Self {
    Self {
      storage: Arc::new(storage),
      fetcher,
      buckets: BucketNames::for_version(config.version),
      manifest: config.app_shell.clone(),
      shell_url: config.shell_url.clone(),
      tile_hosts: config.tile_hosts.clone(),
      max_dynamic_entries: config.max_dynamic_entries,
    }
  }

  pub fn buckets(&self) -> &BucketNames {
    &self.buckets
  }

  /// Populate the static bucket with the full app shell manifest.
  ///
  /// All assets are fetched before anything is written, so a single
  /// unreachable asset fails the install and leaves no partial shell.
  pub async fn install(&self) -> Result<()> {
    let fetches = self.manifest.iter().map(|url| self.fetcher.fetch(url));
    let entries = futures::future::try_join_all(fetches)
      .await
      .map_err(|e| eyre!("Install failed, app shell asset unreachable: {}", e))?;

    for entry in &entries {
      self.storage.put(&self.buckets.static_bucket, entry)?;
    }

    info!(
      assets = entries.len(),
      bucket = %self.buckets.static_bucket,
      "app shell cached"
    );
    Ok(())
  }

  /// Delete every bucket that does not belong to the current version.
  /// Returns the purged bucket names.
  pub fn activate(&self) -> Result<Vec<String>> {
    let mut purged = Vec::new();
    for bucket in self.storage.list_buckets()? {
      if !self.buckets.is_current(&bucket) {
        self.storage.delete_bucket(&bucket)?;
        info!(%bucket, "purged stale cache bucket");
        purged.push(bucket);
      }
    }
    Ok(purged)
  }

  /// Route one request: cache first, then network, then the fallbacks
  /// the request kind allows.
  pub async fn handle(&self, request: &ProxyRequest) -> Result<RouteOutcome> {
    if self.is_tile_request(&request.url) {
      return self.handle_tile(request).await;
    }

    if let Some(entry) = self.match_cached(&request.url)? {
      return Ok(RouteOutcome::Served {
        entry,
        from: ServedFrom::Cache,
      });
    }

    match self.fetcher.fetch(&request.url).await {
      Ok(entry) => {
        self.store_dynamic(&entry)?;
        Ok(RouteOutcome::Served {
          entry,
          from: ServedFrom::Network,
        })
      }
      Err(err) => {
        debug!(url = %request.url, %err, "fetch failed with no cache entry");
        if request.accepts_document() {
          if let Some(entry) = self.match_cached(&self.shell_url)? {
            return Ok(RouteOutcome::Served {
              entry,
              from: ServedFrom::ShellFallback,
            });
          }
        }
        Ok(RouteOutcome::Unavailable)
      }
    }
  }

  /// Tile requests never fall back to the shell; a missing tile is
  /// simply unavailable and the map renders a blank square.
  async fn handle_tile(&self, request: &ProxyRequest) -> Result<RouteOutcome> {
    if let Some(entry) = self.match_cached(&request.url)? {
      return Ok(RouteOutcome::Served {
        entry,
        from: ServedFrom::Cache,
      });
    }

    match self.fetcher.fetch(&request.url).await {
      Ok(entry) => {
        self.store_dynamic(&entry)?;
        Ok(RouteOutcome::Served {
          entry,
          from: ServedFrom::Network,
        })
      }
      Err(err) => {
        warn!(url = %request.url, %err, "tile unavailable");
        Ok(RouteOutcome::Unavailable)
      }
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  fn is_tile_request(&self, url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
      return false;
    };
    let Some(host) = parsed.host_str() else {
      return false;
    };
    self
      .tile_hosts
      .iter()
      .any(|suffix| host == suffix || host.ends_with(&format!(".{suffix}")))
  }

  fn match_cached(&self, url: &str) -> Result<Option<CacheEntry>> {
    self.storage.get_any(
      &[&self.buckets.static_bucket, &self.buckets.dynamic_bucket],
      url,
    )
  }

  fn store_dynamic(&self, entry: &CacheEntry) -> Result<()> {
    self.storage.put(&self.buckets.dynamic_bucket, entry)?;
    self.trim_dynamic()
  }

  /// Re-check after every eviction: a burst of inserts must not leave the
  /// dynamic bucket over its bound.
  fn trim_dynamic(&self) -> Result<()> {
    while self.storage.count(&self.buckets.dynamic_bucket)? > self.max_dynamic_entries {
      match self.storage.evict_oldest(&self.buckets.dynamic_bucket)? {
        Some(url) => debug!(%url, "evicted oldest dynamic cache entry"),
        None => break,
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::SqliteBucketStore;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Mutex;

  /// Fetcher stub with a canned response table and an offline switch.
  struct StubFetch {
    responses: Mutex<HashMap<String, CacheEntry>>,
    offline: AtomicBool,
  }

  impl StubFetch {
    fn new() -> Self {
      Self {
        responses: Mutex::new(HashMap::new()),
        offline: AtomicBool::new(false),
      }
    }

    fn serve(&self, url: &str, content_type: &str, body: &[u8]) {
      self.responses.lock().unwrap().insert(
        url.to_string(),
        CacheEntry::new(url, 200, Some(content_type.to_string()), body.to_vec()),
      );
    }

    fn go_offline(&self) {
      self.offline.store(true, Ordering::SeqCst);
    }
  }

  impl Fetch for &StubFetch {
    async fn fetch(&self, url: &str) -> Result<CacheEntry> {
      if self.offline.load(Ordering::SeqCst) {
        return Err(eyre!("network unreachable"));
      }
      self
        .responses
        .lock()
        .unwrap()
        .get(url)
        .cloned()
        .ok_or_else(|| eyre!("no such resource: {}", url))
    }
  }

  fn config() -> CacheConfig {
    CacheConfig {
      version: 1,
      max_dynamic_entries: 50,
      tile_hosts: vec!["tile.openstreetmap.org".to_string()],
      shell_url: "https://app.local/index.html".to_string(),
      app_shell: vec![
        "https://app.local/index.html".to_string(),
        "https://app.local/style.css".to_string(),
        "https://app.local/app.js".to_string(),
      ],
    }
  }

  fn proxy<'a>(
    fetch: &'a StubFetch,
    config: &CacheConfig,
  ) -> OfflineProxy<SqliteBucketStore, &'a StubFetch> {
    OfflineProxy::new(SqliteBucketStore::open_in_memory().unwrap(), fetch, config)
  }

  fn serve_shell(fetch: &StubFetch, cfg: &CacheConfig) {
    for url in &cfg.app_shell {
      fetch.serve(url, "text/html", b"<html>shell</html>");
    }
  }

  fn tile_url(n: usize) -> String {
    format!("https://a.tile.openstreetmap.org/13/{}/42.png", n)
  }

  #[tokio::test]
  async fn install_caches_the_whole_manifest() {
    let fetch = StubFetch::new();
    let cfg = config();
    serve_shell(&fetch, &cfg);
    let proxy = proxy(&fetch, &cfg);

    proxy.install().await.unwrap();

    assert_eq!(proxy.storage().count(&proxy.buckets().static_bucket).unwrap(), 3);
    assert_eq!(proxy.storage().count(&proxy.buckets().dynamic_bucket).unwrap(), 0);
  }

  #[tokio::test]
  async fn install_fails_whole_if_one_asset_is_unreachable() {
    let fetch = StubFetch::new();
    let cfg = config();
    fetch.serve(&cfg.app_shell[0], "text/html", b"<html>shell</html>");
    // style.css and app.js missing
    let proxy = proxy(&fetch, &cfg);

    assert!(proxy.install().await.is_err());

    let static_count = proxy.storage().count(&proxy.buckets().static_bucket).unwrap();
    assert_eq!(static_count, 0, "a partial shell must not be cached");
  }

  #[tokio::test]
  async fn activate_purges_stale_version_buckets() {
    let fetch = StubFetch::new();
    let cfg = config();
    serve_shell(&fetch, &cfg);
    let storage = SqliteBucketStore::open_in_memory().unwrap();

    // Leftovers from a previous deployment.
    let old = BucketNames::for_version(0);
    storage
      .put(&old.static_bucket, &CacheEntry::new("https://app.local/old", 200, None, b"x".to_vec()))
      .unwrap();
    storage
      .put(&old.dynamic_bucket, &CacheEntry::new(&tile_url(1), 200, None, b"x".to_vec()))
      .unwrap();

    let proxy = OfflineProxy::new(storage, &fetch, &cfg);
    proxy.install().await.unwrap();
    let purged = proxy.activate().unwrap();

    assert_eq!(
      purged,
      vec!["geomoments-dynamic-v0".to_string(), "geomoments-static-v0".to_string()]
    );
    assert_eq!(
      proxy.storage().list_buckets().unwrap(),
      vec!["geomoments-static-v1".to_string()]
    );
  }

  #[tokio::test]
  async fn dynamic_bucket_keeps_only_the_newest_fifty() {
    let fetch = StubFetch::new();
    let cfg = config();
    let proxy = proxy(&fetch, &cfg);

    for n in 0..60 {
      let url = tile_url(n);
      fetch.serve(&url, "image/png", b"tile");
      let outcome = proxy.handle(&ProxyRequest::new(&url)).await.unwrap();
      assert!(matches!(outcome, RouteOutcome::Served { from: ServedFrom::Network, .. }));
    }

    let dynamic = &proxy.buckets().dynamic_bucket;
    assert_eq!(proxy.storage().count(dynamic).unwrap(), 50);

    let retained = proxy.storage().urls_in_order(dynamic).unwrap();
    let expected: Vec<String> = (10..60).map(tile_url).collect();
    assert_eq!(retained, expected, "the 50 most recent insertions survive");
  }

  #[tokio::test]
  async fn cached_tile_is_served_offline() {
    let fetch = StubFetch::new();
    let cfg = config();
    let proxy = proxy(&fetch, &cfg);

    let url = tile_url(7);
    fetch.serve(&url, "image/png", b"tile7");
    proxy.handle(&ProxyRequest::new(&url)).await.unwrap();

    fetch.go_offline();
    let outcome = proxy.handle(&ProxyRequest::new(&url)).await.unwrap();
    match outcome {
      RouteOutcome::Served { entry, from } => {
        assert_eq!(from, ServedFrom::Cache);
        assert_eq!(entry.body, b"tile7");
      }
      RouteOutcome::Unavailable => panic!("cached tile should be served"),
    }
  }

  #[tokio::test]
  async fn uncached_tile_offline_resolves_unavailable() {
    let fetch = StubFetch::new();
    let cfg = config();
    let proxy = proxy(&fetch, &cfg);

    fetch.go_offline();
    let outcome = proxy.handle(&ProxyRequest::new(tile_url(1))).await.unwrap();
    assert!(matches!(outcome, RouteOutcome::Unavailable));
  }

  #[tokio::test]
  async fn offline_document_request_falls_back_to_the_shell() {
    let fetch = StubFetch::new();
    let cfg = config();
    serve_shell(&fetch, &cfg);
    let proxy = proxy(&fetch, &cfg);
    proxy.install().await.unwrap();

    fetch.go_offline();
    let request = ProxyRequest::new("https://app.local/somewhere/else")
      .with_accept("text/html,application/xhtml+xml");
    let outcome = proxy.handle(&request).await.unwrap();

    match outcome {
      RouteOutcome::Served { entry, from } => {
        assert_eq!(from, ServedFrom::ShellFallback);
        assert_eq!(entry.body, b"<html>shell</html>");
      }
      RouteOutcome::Unavailable => panic!("document request should get the shell"),
    }
  }

  #[tokio::test]
  async fn offline_non_document_request_resolves_unavailable() {
    let fetch = StubFetch::new();
    let cfg = config();
    serve_shell(&fetch, &cfg);
    let proxy = proxy(&fetch, &cfg);
    proxy.install().await.unwrap();

    fetch.go_offline();
    let request = ProxyRequest::new("https://app.local/photo.jpg").with_accept("image/jpeg");
    let outcome = proxy.handle(&request).await.unwrap();
    assert!(matches!(outcome, RouteOutcome::Unavailable));
  }

  #[tokio::test]
  async fn installed_shell_assets_hit_the_static_bucket() {
    let fetch = StubFetch::new();
    let cfg = config();
    serve_shell(&fetch, &cfg);
    let proxy = proxy(&fetch, &cfg);
    proxy.install().await.unwrap();

    fetch.go_offline();
    let outcome = proxy
      .handle(&ProxyRequest::new("https://app.local/style.css"))
      .await
      .unwrap();
    assert!(matches!(
      outcome,
      RouteOutcome::Served { from: ServedFrom::Cache, .. }
    ));
  }

  #[tokio::test]
  async fn successful_generic_fetch_is_stored_in_the_dynamic_bucket() {
    let fetch = StubFetch::new();
    let cfg = config();
    let proxy = proxy(&fetch, &cfg);

    fetch.serve("https://cdn.example.com/lib.js", "text/javascript", b"lib");
    proxy
      .handle(&ProxyRequest::new("https://cdn.example.com/lib.js"))
      .await
      .unwrap();

    fetch.go_offline();
    let outcome = proxy
      .handle(&ProxyRequest::new("https://cdn.example.com/lib.js"))
      .await
      .unwrap();
    assert!(matches!(
      outcome,
      RouteOutcome::Served { from: ServedFrom::Cache, .. }
    ));
  }

  #[test]
  fn tile_host_matching_respects_subdomain_boundaries() {
    let fetch = StubFetch::new();
    let cfg = config();
    let proxy = proxy(&fetch, &cfg);

    assert!(proxy.is_tile_request("https://tile.openstreetmap.org/1/2/3.png"));
    assert!(proxy.is_tile_request("https://b.tile.openstreetmap.org/1/2/3.png"));
    assert!(!proxy.is_tile_request("https://eviltile.openstreetmap.org.example.com/x"));
    assert!(!proxy.is_tile_request("https://app.local/index.html"));
    assert!(!proxy.is_tile_request("not a url"));
  }
}
