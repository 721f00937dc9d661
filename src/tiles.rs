//! Slippy-map tile math for the map view.

/// Zoom level used when prefetching tiles around pinned moments.
pub const MARKER_ZOOM: u32 = 13;

/// Tile coordinates covering a WGS84 position at the given zoom.
pub fn tile_for(lat: f64, lng: f64, zoom: u32) -> (u32, u32) {
  let n = f64::from(1u32 << zoom);

  let x = ((lng + 180.0) / 360.0 * n).floor();
  let lat_rad = lat.to_radians();
  let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n).floor();

  let max = (1u32 << zoom) - 1;
  (
    (x.max(0.0) as u32).min(max),
    (y.max(0.0) as u32).min(max),
  )
}

/// Expand a `{z}/{x}/{y}` URL template into a concrete tile URL.
pub fn tile_url(template: &str, zoom: u32, x: u32, y: u32) -> String {
  template
    .replace("{z}", &zoom.to_string())
    .replace("{x}", &x.to_string())
    .replace("{y}", &y.to_string())
}
