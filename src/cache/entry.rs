//! Value types for the offline cache: entries, bucket names, requests
//! and routing outcomes.

/// A cached snapshot of a network response, keyed by request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub url: String,
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl CacheEntry {
  pub fn new(
    url: impl Into<String>,
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
  ) -> Self {
    Self {
      url: url.into(),
      status,
      content_type,
      body,
    }
  }
}

/// Version-stamped names of the two live cache buckets.
///
/// Bumping the version changes both names; the next activation purges
/// every bucket that no longer matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
  pub static_bucket: String,
  pub dynamic_bucket: String,
}

impl BucketNames {
  pub fn for_version(version: u32) -> Self {
    Self {
      static_bucket: format!("geomoments-static-v{version}"),
      dynamic_bucket: format!("geomoments-dynamic-v{version}"),
    }
  }

  /// Whether `name` is one of the two live buckets.
  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_bucket || name == self.dynamic_bucket
  }
}

/// An outbound request as seen by the proxy: the URL plus the accept
/// header, which decides whether the shell fallback applies.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
  pub url: String,
  pub accept: Option<String>,
}

impl ProxyRequest {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      accept: None,
    }
  }

  pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
    self.accept = Some(accept.into());
    self
  }

  /// True when the requester accepts an HTML document.
  pub fn accepts_document(&self) -> bool {
    self
      .accept
      .as_deref()
      .is_some_and(|a| a.contains("text/html"))
  }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Network,
  Cache,
  /// Offline document request answered with the cached app shell.
  ShellFallback,
}

impl std::fmt::Display for ServedFrom {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ServedFrom::Network => write!(f, "network"),
      ServedFrom::Cache => write!(f, "cache"),
      ServedFrom::ShellFallback => write!(f, "shell fallback"),
    }
  }
}

/// Result of routing one request.
///
/// `Unavailable` is a resolved outcome, not an error: the requester must
/// treat the missing resource as absent (a blank map tile, for example).
#[derive(Debug, Clone)]
pub enum RouteOutcome {
  Served { entry: CacheEntry, from: ServedFrom },
  Unavailable,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bucket_names_carry_the_version() {
    let names = BucketNames::for_version(3);
    assert_eq!(names.static_bucket, "geomoments-static-v3");
    assert_eq!(names.dynamic_bucket, "geomoments-dynamic-v3");
    assert!(names.is_current("geomoments-static-v3"));
    assert!(!names.is_current("geomoments-static-v2"));
  }

  #[test]
  fn accepts_document_checks_the_accept_header() {
    let doc = ProxyRequest::new("https://example.com/page")
      .with_accept("text/html,application/xhtml+xml");
    assert!(doc.accepts_document());

    let tile = ProxyRequest::new("https://example.com/tile.png").with_accept("image/png");
    assert!(!tile.accepts_document());

    assert!(!ProxyRequest::new("https://example.com/x").accepts_document());
  }
}
