use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Where the databases live (default: platform data dir).
  pub data_dir: Option<PathBuf>,
  pub cache: CacheConfig,
  pub map: MapConfig,
}

/// Offline cache proxy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Version token baked into the bucket names; bump on deployment to
  /// purge all previously cached content on the next activation.
  pub version: u32,
  /// Bound on the dynamic bucket; oldest entries are evicted past it.
  pub max_dynamic_entries: u64,
  /// Host suffixes routed as map tile requests.
  pub tile_hosts: Vec<String>,
  /// Document served to offline navigation requests.
  pub shell_url: String,
  /// The full app shell manifest cached at install time.
  pub app_shell: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let base = "https://geomoments.app";
    Self {
      version: 1,
      max_dynamic_entries: 50,
      tile_hosts: vec!["tile.openstreetmap.org".to_string()],
      shell_url: format!("{base}/index.html"),
      app_shell: vec![
        format!("{base}/index.html"),
        format!("{base}/style.css"),
        format!("{base}/app.js"),
        format!("{base}/manifest.json"),
        format!("{base}/icons/icon-192.png"),
        format!("{base}/icons/icon-512.png"),
      ],
    }
  }
}

/// Map view settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
  /// Tile URL template with {z}/{x}/{y} placeholders.
  pub tile_url_template: String,
  /// Zoom level for marker tile prefetching.
  pub zoom: u32,
}

impl Default for MapConfig {
  fn default() -> Self {
    Self {
      tile_url_template: "https://a.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
      zoom: crate::tiles::MARKER_ZOOM,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./geomoments.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/geomoments/config.yaml
  ///
  /// Everything has a default, so a missing config file is fine.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("geomoments.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("geomoments").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Directory holding both databases.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("geomoments"))
  }

  pub fn moments_db_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("moments.db"))
  }

  /// The cache proxy gets its own database file: the two subsystems share
  /// no storage namespace.
  pub fn cache_db_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("cache.db"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_when_fields_are_missing() {
    let config: Config = serde_yaml::from_str("cache:\n  version: 7\n").unwrap();
    assert_eq!(config.cache.version, 7);
    assert_eq!(config.cache.max_dynamic_entries, 50);
    assert!(!config.cache.app_shell.is_empty());
    assert_eq!(config.map.zoom, crate::tiles::MARKER_ZOOM);
  }

  #[test]
  fn database_files_are_separate() {
    let config = Config {
      data_dir: Some(PathBuf::from("/tmp/gm")),
      ..Config::default()
    };
    assert_eq!(config.moments_db_path().unwrap(), PathBuf::from("/tmp/gm/moments.db"));
    assert_eq!(config.cache_db_path().unwrap(), PathBuf::from("/tmp/gm/cache.db"));
  }
}
