use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::constants;

/// Name of the environment variable that overrides the listing API base URL.
pub const API_BASE_ENV: &str = "SUIKAN_API_BASE";

/// User preferences loaded from `prefs.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Config {
  pub api_base: Option<String>,
  pub view_mode: Option<String>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "suikan") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "suikan") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          if let Err(e) = std::fs::write(&config_file, content) {
            warn!(err = %e, path = %config_file.display(), "failed to save prefs");
          }
        }
      }
    }
  }

  /// Resolve the listing API base URL.
  ///
  /// Order: CLI flag, then the `SUIKAN_API_BASE` environment variable,
  /// then the prefs file, then the built-in fallback.
  pub fn resolve_api_base(&self, cli_override: Option<&str>) -> String {
    if let Some(base) = cli_override
      && !base.trim().is_empty()
    {
      return normalize_base(base);
    }
    if let Ok(base) = std::env::var(API_BASE_ENV)
      && !base.trim().is_empty()
    {
      return normalize_base(&base);
    }
    if let Some(ref base) = self.api_base
      && !base.trim().is_empty()
    {
      return normalize_base(base);
    }
    constants().default_api_base.clone()
  }
}

fn normalize_base(base: &str) -> String {
  base.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_override_wins_and_is_normalized() {
    let config = Config { api_base: Some("https://prefs.example".to_string()), view_mode: None };
    assert_eq!(config.resolve_api_base(Some("https://cli.example/")), "https://cli.example");
  }

  #[test]
  fn prefs_value_used_when_no_override() {
    // Note: assumes SUIKAN_API_BASE is unset in the test environment.
    let config = Config { api_base: Some("https://prefs.example/".to_string()), view_mode: None };
    if std::env::var(API_BASE_ENV).is_err() {
      assert_eq!(config.resolve_api_base(None), "https://prefs.example");
    }
  }

  #[test]
  fn falls_back_to_builtin_default() {
    let config = Config::default();
    if std::env::var(API_BASE_ENV).is_err() {
      assert_eq!(config.resolve_api_base(None), constants().default_api_base);
    }
  }
}
