//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Listing API
  pub default_api_base: String,
  pub search_path: String,
  pub user_agent: String,

  // UI
  pub event_poll_ms: u64,
  pub error_dismiss_secs: u64,
  pub episode_grid_columns: usize,

  // Playback rate bounds (mpv speed property)
  pub rate_min: f64,
  pub rate_max: f64,
  pub rate_step: f64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
