use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliViewMode {
  Auto,
  Windowed,
  Fullscreen,
}

/// How playback is presented: mpv in a window, or mpv taking the whole
/// screen (the terminal analog of the mobile app's landscape lock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
  Windowed,
  Fullscreen,
}

impl ViewMode {
  pub fn label(self) -> &'static str {
    match self {
      ViewMode::Windowed => "windowed",
      ViewMode::Fullscreen => "fullscreen",
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "fullscreen" => ViewMode::Fullscreen,
      _ => ViewMode::Windowed,
    }
  }
}

/// Detect a sensible default view mode.
///
/// Fullscreen playback only makes sense on a local display; over SSH or
/// without a display server, mpv stays windowed (or falls back to its own
/// terminal output).
pub fn detect_view_mode() -> ViewMode {
  if std::env::var_os("SSH_CONNECTION").is_some() {
    return ViewMode::Windowed;
  }
  if cfg!(target_os = "macos") {
    return ViewMode::Fullscreen;
  }
  if std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some() {
    return ViewMode::Fullscreen;
  }
  ViewMode::Windowed
}

/// Resolve the effective view mode: CLI flag first, then the saved
/// preference, then auto-detection.
pub fn resolve_view_mode(cli: CliViewMode, configured: Option<&str>) -> ViewMode {
  match cli {
    CliViewMode::Auto => configured.map(ViewMode::from_config).unwrap_or_else(detect_view_mode),
    CliViewMode::Windowed => ViewMode::Windowed,
    CliViewMode::Fullscreen => ViewMode::Fullscreen,
  }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliGraphicsMode {
  Auto,
  Kitty,
  Sixel,
  HalfBlock,
  Ascii,
}

/// How result posters are drawn in the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsMode {
  Ascii,
  HalfBlock,
  Sixel,
  Kitty,
}

impl GraphicsMode {
  pub fn label(self) -> &'static str {
    match self {
      GraphicsMode::Ascii => "ASCII",
      GraphicsMode::HalfBlock => "Half-block",
      GraphicsMode::Sixel => "Sixel",
      GraphicsMode::Kitty => "Kitty",
    }
  }

  /// Protocol modes draw outside the ratatui buffer after each frame.
  pub fn uses_protocol(self) -> bool {
    matches!(self, GraphicsMode::Kitty | GraphicsMode::Sixel)
  }
}

/// Detect the best poster rendering the terminal supports.
///
/// Probe order: Kitty graphics > Sixel > true-color half-block > ASCII
///
/// - Kitty: `TERM=xterm-kitty`, or `TERM_PROGRAM` is kitty/WezTerm/ghostty
/// - Sixel: `TERM_PROGRAM` is foot/mlterm/contour, or `TERM` contains "sixel"
/// - HalfBlock: `COLORTERM` is `truecolor` or `24bit`
/// - Ascii: fallback
pub fn detect_graphics_mode() -> GraphicsMode {
  let term = std::env::var("TERM").unwrap_or_default();
  let term_program = std::env::var("TERM_PROGRAM").unwrap_or_default().to_lowercase();

  if term == "xterm-kitty" || matches!(term_program.as_str(), "kitty" | "wezterm" | "ghostty") {
    return GraphicsMode::Kitty;
  }

  if matches!(term_program.as_str(), "foot" | "mlterm" | "contour") || term.contains("sixel") {
    return GraphicsMode::Sixel;
  }

  let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
  if colorterm == "truecolor" || colorterm == "24bit" {
    return GraphicsMode::HalfBlock;
  }

  GraphicsMode::Ascii
}

pub fn resolve_graphics_mode(cli: CliGraphicsMode) -> GraphicsMode {
  match cli {
    CliGraphicsMode::Auto => detect_graphics_mode(),
    CliGraphicsMode::Kitty => GraphicsMode::Kitty,
    CliGraphicsMode::Sixel => GraphicsMode::Sixel,
    CliGraphicsMode::HalfBlock => GraphicsMode::HalfBlock,
    CliGraphicsMode::Ascii => GraphicsMode::Ascii,
  }
}

/// Scoped display-state guard for the player screen.
///
/// The mobile original locks orientation and hides the status bar when the
/// player screen mounts, and must undo both when it unmounts. The TUI
/// analog hides the search chrome (input box and footer) while the player
/// screen is active. Acquire and release are idempotent, so repeated mode
/// transitions cannot leave the chrome half-applied, and release restores
/// whatever state acquire observed.
#[derive(Debug, Default)]
pub struct ChromeGuard {
  active: bool,
  prior_visible: bool,
}

impl ChromeGuard {
  pub fn acquire(&mut self, chrome_visible: &mut bool) {
    if self.active {
      return;
    }
    self.prior_visible = *chrome_visible;
    *chrome_visible = false;
    self.active = true;
  }

  pub fn release(&mut self, chrome_visible: &mut bool) {
    if !self.active {
      return;
    }
    *chrome_visible = self.prior_visible;
    self.active = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn view_mode_from_config() {
    assert_eq!(ViewMode::from_config("fullscreen"), ViewMode::Fullscreen);
    assert_eq!(ViewMode::from_config("Fullscreen"), ViewMode::Fullscreen);
    assert_eq!(ViewMode::from_config("windowed"), ViewMode::Windowed);
    assert_eq!(ViewMode::from_config("garbage"), ViewMode::Windowed);
  }

  #[test]
  fn resolve_explicit_cli_wins_over_config() {
    assert_eq!(resolve_view_mode(CliViewMode::Windowed, Some("fullscreen")), ViewMode::Windowed);
    assert_eq!(resolve_view_mode(CliViewMode::Fullscreen, Some("windowed")), ViewMode::Fullscreen);
  }

  #[test]
  fn resolve_auto_uses_config_when_present() {
    assert_eq!(resolve_view_mode(CliViewMode::Auto, Some("fullscreen")), ViewMode::Fullscreen);
    assert_eq!(resolve_view_mode(CliViewMode::Auto, Some("windowed")), ViewMode::Windowed);
  }

  #[test]
  fn resolve_explicit_graphics_mode_skips_detection() {
    assert_eq!(resolve_graphics_mode(CliGraphicsMode::Kitty), GraphicsMode::Kitty);
    assert_eq!(resolve_graphics_mode(CliGraphicsMode::Ascii), GraphicsMode::Ascii);
  }

  #[test]
  fn only_kitty_and_sixel_use_a_protocol() {
    assert!(GraphicsMode::Kitty.uses_protocol());
    assert!(GraphicsMode::Sixel.uses_protocol());
    assert!(!GraphicsMode::HalfBlock.uses_protocol());
    assert!(!GraphicsMode::Ascii.uses_protocol());
  }

  #[test]
  fn chrome_guard_acquire_release_restores_prior_state() {
    let mut guard = ChromeGuard::default();
    let mut visible = true;

    guard.acquire(&mut visible);
    assert!(!visible);
    assert!(guard.active);

    guard.release(&mut visible);
    assert!(visible);
    assert!(!guard.active);
  }

  #[test]
  fn chrome_guard_is_idempotent() {
    let mut guard = ChromeGuard::default();
    let mut visible = true;

    guard.acquire(&mut visible);
    // A second acquire must not record the already-hidden state as prior.
    guard.acquire(&mut visible);
    guard.release(&mut visible);
    assert!(visible);

    // Releasing again is a no-op.
    guard.release(&mut visible);
    assert!(visible);
  }
}
