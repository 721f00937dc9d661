//! Payload encoding for captured files.
//!
//! Photos and voice notes are stored inside the moment record as base64
//! data URLs, so a record is self-contained and survives the source file
//! being moved or deleted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use color_eyre::{eyre::eyre, Result};
use std::path::Path;

/// Read a file and encode it as a `data:<mime>;base64,...` URL.
pub fn encode_data_url(path: &Path) -> Result<String> {
  let bytes = std::fs::read(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  Ok(format!(
    "data:{};base64,{}",
    mime_for_path(path),
    STANDARD.encode(bytes)
  ))
}

/// Best-effort mime type from the file extension.
fn mime_for_path(path: &Path) -> &'static str {
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_lowercase)
    .unwrap_or_default();

  match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "webp" => "image/webp",
    "gif" => "image/gif",
    "webm" => "audio/webm",
    "mp3" => "audio/mpeg",
    "m4a" | "mp4" => "audio/mp4",
    "ogg" => "audio/ogg",
    "wav" => "audio/wav",
    _ => "application/octet-stream",
  }
}

/// Approximate decoded size of a data URL payload, for display.
pub fn payload_size(data_url: &str) -> usize {
  let encoded = data_url.split_once(',').map_or("", |(_, rest)| rest);
  encoded.len() * 3 / 4
}

/// Human-readable byte count.
pub fn human_size(bytes: usize) -> String {
  if bytes >= 1024 * 1024 {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
  } else if bytes >= 1024 {
    format!("{:.1} KB", bytes as f64 / 1024.0)
  } else {
    format!("{bytes} B")
  }
}
