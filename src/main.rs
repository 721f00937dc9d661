mod app;
mod cache;
mod config;
mod media;
mod moment;
mod store;
mod tiles;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::moment::GeoPoint;

#[derive(Parser, Debug)]
#[command(name = "geomoments")]
#[command(about = "A local-first photo moments journal with offline map tile caching")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/geomoments/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Capture a new moment from a photo file
  Add {
    /// Photo file to attach
    #[arg(long)]
    image: PathBuf,

    /// What this moment is about
    #[arg(long)]
    desc: String,

    /// Latitude of the capture location
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the capture location
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,

    /// Voice note file to attach
    #[arg(long)]
    audio: Option<PathBuf>,
  },

  /// List saved moments, newest first
  List {
    /// Print as JSON
    #[arg(long)]
    json: bool,
  },

  /// Delete a single moment by id
  Delete {
    id: i64,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
  },

  /// Delete all moments
  Clear {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
  },

  /// Show geotagged moments and prefetch their map tiles
  Map,

  /// Offline cache administration
  #[command(subcommand)]
  Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Cache the app shell and purge stale-version buckets
  Install,

  /// Route a single request through the offline proxy
  Fetch {
    url: String,

    /// Accept header to route with (e.g. "text/html")
    #[arg(long)]
    accept: Option<String>,
  },

  /// Show cache buckets and entry counts
  Status,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let app = app::App::new(config);

  match args.command {
    Command::Add {
      image,
      desc,
      lat,
      lng,
      audio,
    } => {
      let geo = lat.zip(lng).map(|(lat, lng)| GeoPoint { lat, lng });
      app.add(&image, &desc, geo, audio.as_deref()).await
    }
    Command::List { json } => app.list(json).await,
    Command::Delete { id, yes } => app.delete(id, yes).await,
    Command::Clear { yes } => app.clear(yes).await,
    Command::Map => app.map().await,
    Command::Cache(cmd) => match cmd {
      CacheCommand::Install => app.cache_install().await,
      CacheCommand::Fetch { url, accept } => app.cache_fetch(&url, accept.as_deref()).await,
      CacheCommand::Status => app.cache_status().await,
    },
  }
}
