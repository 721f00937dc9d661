//! Offline-first caching layer.
//!
//! This module provides the network-proxying half of the app:
//! - a durable, bucket-partitioned response cache over SQLite
//! - a versioned install/activate lifecycle for the app shell
//! - cache-first request routing with a FIFO-bounded dynamic bucket
//!   and a cached-shell fallback for offline document requests

mod entry;
mod fetch;
mod proxy;
mod storage;

pub use entry::{BucketNames, CacheEntry, ProxyRequest, RouteOutcome, ServedFrom};
pub use fetch::{Fetch, HttpFetcher};
pub use proxy::OfflineProxy;
pub use storage::{BucketStore, SqliteBucketStore};
