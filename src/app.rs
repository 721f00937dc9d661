//! Command handlers: the capture, gallery, map and cache-admin flows.

use color_eyre::Result;
use std::io::Write as _;
use std::path::Path;

use crate::cache::{
  BucketStore, HttpFetcher, OfflineProxy, ProxyRequest, RouteOutcome, SqliteBucketStore,
};
use crate::config::Config;
use crate::media;
use crate::moment::{GeoPoint, Moment};
use crate::store::{MomentStore, StoreError};
use crate::tiles;

pub struct App {
  config: Config,
}

impl App {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  fn store(&self) -> Result<MomentStore> {
    Ok(MomentStore::new(self.config.moments_db_path()?))
  }

  fn proxy(&self) -> Result<OfflineProxy<SqliteBucketStore, HttpFetcher>> {
    let storage = SqliteBucketStore::open(self.config.cache_db_path()?)?;
    Ok(OfflineProxy::new(
      storage,
      HttpFetcher::new()?,
      &self.config.cache,
    ))
  }

  /// Capture a new moment from files on disk.
  pub async fn add(
    &self,
    image: &Path,
    desc: &str,
    geo: Option<GeoPoint>,
    audio: Option<&Path>,
  ) -> Result<()> {
    let image = media::encode_data_url(image)?;
    let audio = audio.map(media::encode_data_url).transpose()?;

    let moment = Moment::new(image, desc, geo, audio)?;
    let id = moment.id;
    self.store()?.create(&moment).await?;

    println!("Saved moment {id}.");
    Ok(())
  }

  /// Print the gallery, newest first.
  pub async fn list(&self, json: bool) -> Result<()> {
    let moments = match self.store()?.list_all().await {
      Ok(moments) => moments,
      Err(e @ StoreError::Unavailable(_)) => {
        // The gallery degrades to a message instead of crashing.
        println!("Moments unavailable: {e}");
        return Ok(());
      }
      Err(e) => return Err(e.into()),
    };

    if json {
      println!("{}", serde_json::to_string_pretty(&moments)?);
      return Ok(());
    }

    if moments.is_empty() {
      println!("No moments yet. Add your first one!");
      return Ok(());
    }

    for m in &moments {
      println!("#{}  {}", m.id, m.date);
      println!("  {}", m.desc);

      let mut parts = vec![format!(
        "photo {}",
        media::human_size(media::payload_size(&m.image))
      )];
      if let Some(audio) = &m.audio {
        parts.push(format!(
          "audio {}",
          media::human_size(media::payload_size(audio))
        ));
      }
      println!("  {}", parts.join(", "));

      if let Some(geo) = m.geo {
        println!("  map: https://www.google.com/maps?q={},{}", geo.lat, geo.lng);
      }
      println!();
    }
    Ok(())
  }

  pub async fn delete(&self, id: i64, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Delete moment {id}?"))? {
      println!("Aborted.");
      return Ok(());
    }
    self.store()?.delete_by_id(id).await?;
    println!("Deleted.");
    Ok(())
  }

  pub async fn clear(&self, yes: bool) -> Result<()> {
    if !yes && !confirm("Delete ALL moments?")? {
      println!("Aborted.");
      return Ok(());
    }
    self.store()?.clear().await?;
    println!("All moments deleted.");
    Ok(())
  }

  /// Show geotagged moments and prefetch their map tiles through the
  /// offline proxy. A missing tile is reported, never an error.
  pub async fn map(&self) -> Result<()> {
    let moments = self.store()?.list_all().await?;
    let zoom = self.config.map.zoom;
    let proxy = self.proxy()?;
    let mut pinned = 0;

    for m in &moments {
      let Some(geo) = m.geo else { continue };
      pinned += 1;

      let (x, y) = tiles::tile_for(geo.lat, geo.lng, zoom);
      let url = tiles::tile_url(&self.config.map.tile_url_template, zoom, x, y);

      println!("#{}  {:.4},{:.4}  {}", m.id, geo.lat, geo.lng, m.desc);
      match proxy.handle(&ProxyRequest::new(&url)).await? {
        RouteOutcome::Served { from, .. } => println!("  tile {url} ({from})"),
        RouteOutcome::Unavailable => println!("  tile {url} (unavailable: offline and not cached)"),
      }
    }

    if pinned == 0 {
      println!("No geotagged moments.");
    }
    Ok(())
  }

  /// Populate the app shell cache and purge stale-version buckets.
  pub async fn cache_install(&self) -> Result<()> {
    let proxy = self.proxy()?;
    proxy.install().await?;
    let purged = proxy.activate()?;

    println!("App shell cached into {}.", proxy.buckets().static_bucket);
    if purged.is_empty() {
      println!("No stale buckets to purge.");
    } else {
      println!("Purged stale buckets: {}", purged.join(", "));
    }
    Ok(())
  }

  /// Route a single request through the proxy and report the outcome.
  pub async fn cache_fetch(&self, url: &str, accept: Option<&str>) -> Result<()> {
    let proxy = self.proxy()?;
    let mut request = ProxyRequest::new(url);
    if let Some(accept) = accept {
      request = request.with_accept(accept);
    }

    match proxy.handle(&request).await? {
      RouteOutcome::Served { entry, from } => {
        println!(
          "{} {} {} ({from})",
          entry.status,
          entry.content_type.as_deref().unwrap_or("-"),
          media::human_size(entry.body.len()),
        );
      }
      RouteOutcome::Unavailable => println!("unavailable (no cache entry, no network)"),
    }
    Ok(())
  }

  /// List live cache buckets with entry counts.
  pub async fn cache_status(&self) -> Result<()> {
    let proxy = self.proxy()?;
    let buckets = proxy.storage().list_buckets()?;

    if buckets.is_empty() {
      println!("Cache is empty. Run `geomoments cache install` first.");
      return Ok(());
    }

    for bucket in buckets {
      let count = proxy.storage().count(&bucket)?;
      let marker = if proxy.buckets().is_current(&bucket) {
        ""
      } else {
        " (stale)"
      };
      println!("{bucket}: {count} entries{marker}");
    }
    Ok(())
  }
}

fn confirm(prompt: &str) -> Result<bool> {
  print!("{prompt} [y/N] ");
  std::io::stdout().flush()?;

  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
