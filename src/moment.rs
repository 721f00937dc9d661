//! The Moment record type.

use chrono::{Local, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};

/// A captured GPS position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub lat: f64,
  pub lng: f64,
}

/// A single captured moment: a photo, a description, and optional
/// geolocation and voice note. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
  /// Creation timestamp in milliseconds; primary key and sort key.
  pub id: i64,
  /// Photo as a base64 data URL.
  pub image: String,
  pub desc: String,
  pub geo: Option<GeoPoint>,
  /// Voice note as a base64 data URL.
  pub audio: Option<String>,
  /// Display-only creation date; sorting always goes by `id`.
  pub date: String,
}

impl Moment {
  /// Build a new moment, assigning the id and display date.
  ///
  /// Rejects an empty photo or a description that is blank after trimming.
  pub fn new(
    image: String,
    desc: &str,
    geo: Option<GeoPoint>,
    audio: Option<String>,
  ) -> Result<Self> {
    let desc = desc.trim();
    if image.is_empty() {
      return Err(eyre!("a moment needs a photo"));
    }
    if desc.is_empty() {
      return Err(eyre!("a moment needs a description"));
    }

    Ok(Self {
      id: Utc::now().timestamp_millis(),
      image,
      desc: desc.to_string(),
      geo,
      audio,
      date: Local::now().format("%Y-%m-%d %H:%M").to_string(),
    })
  }
}
