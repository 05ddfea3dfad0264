use image::DynamicImage;
use ratatui::{layout::Rect, widgets::ListState};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::api::{SearchError, VideoSummary, VodClient};
use crate::config::Config;
use crate::constants::constants;
use crate::display::{ChromeGuard, GraphicsMode, ViewMode};
use crate::episodes::Playlist;
use crate::player::VideoPlayer;

// --- Types ---

pub type SearchResult = Result<Vec<VideoSummary>, SearchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Search entry — the home screen's text box.
  Input,
  /// Search results list.
  Results,
  /// Episode grid + playback for one loaded title.
  Player,
}

/// In-flight async task receivers.
///
/// Each search receiver is tagged with the generation it was spawned
/// under; completions from superseded generations are discarded so a slow
/// response can never overwrite newer state.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) search_rx: Option<(u64, oneshot::Receiver<SearchResult>)>,
  /// Poster fetch for the highlighted result, tagged with its result id.
  /// `None` in the payload means the fetch failed; the pane stays empty.
  pub(crate) poster_rx: Option<(String, oneshot::Receiver<Option<DynamicImage>>)>,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub search_results: Vec<VideoSummary>,
  pub list_state: ListState,
  pub player: VideoPlayer,
  /// The title currently loaded into the player screen.
  pub current_title: Option<VideoSummary>,
  pub playlist: Playlist,
  /// 0-based grid cursor into the playlist (distinct from the selection,
  /// which only moves when an episode is actually chosen).
  pub episode_cursor: usize,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  /// Whether the search chrome (input box, footer) is drawn. Managed by
  /// `chrome_guard` across player entry/exit.
  pub chrome_visible: bool,
  pub graphics_mode: GraphicsMode,
  /// Decoded poster of a search result, keyed by its result id.
  pub poster: Option<(String, DynamicImage)>,
  /// Resize cache: (result id, pane width, pane height, resized image).
  /// Avoids a Lanczos resample on every frame.
  pub poster_resized: Option<(String, u16, u16, DynamicImage)>,
  /// Where the poster pane landed this frame. Only set for the protocol
  /// graphics modes; the run loop sends the image there after the draw.
  pub poster_area: Option<Rect>,
  pub poster_last_sent: Option<(String, Rect)>,
  pub(crate) chrome_guard: ChromeGuard,
  pub(crate) tasks: AsyncTasks,
  pub(crate) search_generation: u64,
  client: VodClient,
  config: Config,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(client: VodClient, view_mode: ViewMode, graphics_mode: GraphicsMode, config: Config) -> Self {
    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Input,
      search_results: Vec::new(),
      list_state: ListState::default(),
      player: VideoPlayer::new(view_mode),
      current_title: None,
      playlist: Playlist::default(),
      episode_cursor: 0,
      last_error: None,
      status_message: None,
      should_quit: false,
      chrome_visible: true,
      graphics_mode,
      poster: None,
      poster_resized: None,
      poster_area: None,
      poster_last_sent: None,
      chrome_guard: ChromeGuard::default(),
      tasks: AsyncTasks::default(),
      search_generation: 0,
      client,
      config,
      error_time: None,
    }
  }

  // --- Errors ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Clear the current error message and its expiry timer.
  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after the configured delay.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Search ---

  /// Kick off a search for the current input text.
  ///
  /// A blank query is silently ignored — no request, no state change.
  /// Re-triggering while a search is pending is allowed; the generation
  /// counter ensures only the newest response is applied.
  pub fn trigger_search(&mut self) {
    let query = self.input.trim().to_string();
    if query.is_empty() {
      debug!("ignoring search with empty query");
      return;
    }
    info!(query = %query, "search triggered");
    self.search_generation += 1;
    let generation = self.search_generation;
    self.clear_error();
    self.status_message = Some(format!("Searching '{}'…", query));

    let client = self.client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(client.search(&query).await);
    });
    self.tasks.search_rx = Some((generation, rx));
  }

  /// The search result the list cursor is on, if any.
  pub fn highlighted_result(&self) -> Option<&VideoSummary> {
    self.list_state.selected().and_then(|i| self.search_results.get(i))
  }

  /// Fetch the highlighted result's poster in the background.
  ///
  /// Skipped when the result has no poster URL, when its poster is
  /// already cached, or when a fetch for it is already in flight. A
  /// fetch that fails just leaves the pane empty.
  pub fn request_poster(&mut self) {
    let Some(summary) = self.highlighted_result() else { return };
    let id = summary.id.clone();
    let url = summary.thumbnail_url.clone();

    if url.trim().is_empty() {
      return;
    }
    if self.poster.as_ref().is_some_and(|(cached, _)| *cached == id) {
      return;
    }
    if self.tasks.poster_rx.as_ref().is_some_and(|(pending, _)| *pending == id) {
      return;
    }

    debug!(id = %id, url = %url, "fetching poster");
    let client = self.client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(client.fetch_poster(&url).await.ok());
    });
    self.tasks.poster_rx = Some((id, rx));
  }

  /// Poll in-flight tasks. Called once per frame from the run loop.
  pub async fn check_pending(&mut self) {
    if let Some((id, mut rx)) = self.tasks.poster_rx.take() {
      match rx.try_recv() {
        Ok(Some(image)) => {
          debug!(id = %id, "poster received");
          self.poster = Some((id, image));
        }
        Ok(None) => {
          debug!(id = %id, "poster unavailable");
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.poster_rx = Some((id, rx));
        }
        Err(oneshot::error::TryRecvError::Closed) => {}
      }
    }

    if let Some((generation, mut rx)) = self.tasks.search_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          if generation != self.search_generation {
            // A newer search superseded this one while it was in flight.
            debug!(generation, latest = self.search_generation, "discarding stale search response");
            return;
          }
          self.status_message = None;
          self.apply_search_result(result);
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.search_rx = Some((generation, rx));
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          if generation == self.search_generation {
            self.status_message = None;
            self.set_error("Search task failed.".to_string());
          }
        }
      }
    }
  }

  fn apply_search_result(&mut self, result: SearchResult) {
    match result {
      Ok(results) if results.is_empty() => {
        self.set_error("No results found.".to_string());
      }
      Ok(results) => {
        info!(count = results.len(), "search results received");
        self.search_results = results;
        self.list_state.select(Some(0));
        self.mode = AppMode::Results;
        self.request_poster();
      }
      // Previous results stay on screen; the user retries by searching again.
      Err(e) => {
        warn!(err = %e, "search failed");
        self.set_error(format!("Search failed: {}", e));
      }
    }
  }

  // --- Player screen ---

  /// Open the player screen for the selected search result: parse its
  /// play list, select episode 1, hide the search chrome, and start
  /// playback when a default episode exists.
  pub async fn open_player(&mut self) {
    let Some(selected) = self.list_state.selected() else { return };
    let Some(summary) = self.search_results.get(selected) else { return };
    let summary = summary.clone();

    let playlist = Playlist::from_raw(&summary.raw_play_list);
    info!(id = %summary.id, title = %summary.title, episodes = playlist.len(), "opening player");

    self.playlist = playlist;
    self.episode_cursor = 0;
    self.current_title = Some(summary);
    self.chrome_guard.acquire(&mut self.chrome_visible);
    self.mode = AppMode::Player;

    if self.playlist.selected_ordinal().is_some() {
      self.play_selected().await;
    } else {
      self.set_error("No playable episodes.".to_string());
    }
  }

  /// Choose episode `ordinal` and play it. Out-of-range ordinals are
  /// rejected and leave both the selection and playback untouched.
  pub async fn select_episode(&mut self, ordinal: usize) {
    if !self.playlist.select(ordinal) {
      debug!(ordinal, len = self.playlist.len(), "rejected out-of-range episode selection");
      return;
    }
    self.episode_cursor = ordinal - 1;
    self.play_selected().await;
  }

  async fn play_selected(&mut self) {
    let Some(title) = self.current_title.as_ref().map(|s| s.title.clone()) else { return };
    let Some(episode) = self.playlist.selected().cloned() else { return };
    if let Err(e) = self.player.play(&title, episode).await {
      self.set_error(format!("Playback error: {}", e));
      let _ = self.player.stop().await;
    }
  }

  /// Leave the player screen: stop playback, restore the chrome, and
  /// return to the results list (or the search box if there is none).
  pub async fn close_player(&mut self) {
    if let Err(e) = self.player.stop().await {
      warn!(err = %e, "failed to stop playback on player exit");
    }
    self.chrome_guard.release(&mut self.chrome_visible);
    self.current_title = None;
    self.playlist = Playlist::default();
    self.episode_cursor = 0;
    self.mode = if self.search_results.is_empty() { AppMode::Input } else { AppMode::Results };
  }

  /// Toggle the playback view mode and persist the preference.
  pub fn toggle_view_mode(&mut self) {
    self.player.view_mode = match self.player.view_mode {
      ViewMode::Windowed => ViewMode::Fullscreen,
      ViewMode::Fullscreen => ViewMode::Windowed,
    };
    self.config.view_mode = Some(self.player.view_mode.label().to_string());
    self.config.save();
  }

  /// Final teardown on quit: stop mpv and restore any held display state.
  pub async fn shutdown(&mut self) {
    let _ = self.player.stop().await;
    self.chrome_guard.release(&mut self.chrome_visible);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_app() -> App {
    App::new(VodClient::new("http://127.0.0.1:0"), ViewMode::Windowed, GraphicsMode::HalfBlock, Config::default())
  }

  fn summary(id: &str, title: &str, raw_play_list: &str) -> VideoSummary {
    VideoSummary {
      id: id.to_string(),
      title: title.to_string(),
      thumbnail_url: String::new(),
      remarks: String::new(),
      synopsis: String::new(),
      raw_play_list: raw_play_list.to_string(),
    }
  }

  // --- search result handling ---

  #[tokio::test]
  async fn successful_search_replaces_results_and_enters_results_mode() {
    let mut app = test_app();
    app.search_generation = 1;
    let (tx, rx) = oneshot::channel();
    tx.send(Ok(vec![summary("1", "Inception", "a$u")])).unwrap();
    app.tasks.search_rx = Some((1, rx));

    app.check_pending().await;

    assert_eq!(app.search_results.len(), 1);
    assert_eq!(app.mode, AppMode::Results);
    assert_eq!(app.list_state.selected(), Some(0));
    assert!(app.last_error.is_none());
  }

  #[tokio::test]
  async fn stale_search_response_is_discarded() {
    let mut app = test_app();
    app.search_results = vec![summary("1", "Current", "a$u")];
    // The app has already moved on to generation 2.
    app.search_generation = 2;
    let (tx, rx) = oneshot::channel();
    tx.send(Ok(vec![summary("9", "Stale", "b$u")])).unwrap();
    app.tasks.search_rx = Some((1, rx));

    app.check_pending().await;

    assert_eq!(app.search_results.len(), 1);
    assert_eq!(app.search_results[0].title, "Current");
    assert_eq!(app.mode, AppMode::Input);
  }

  #[tokio::test]
  async fn failed_search_keeps_previous_results_and_sets_error() {
    let mut app = test_app();
    app.search_results = vec![summary("1", "Kept", "a$u")];
    app.search_generation = 1;

    // Produce a real transport error from a port that refuses connections.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = VodClient::new(format!("http://{}", addr));
    let (tx, rx) = oneshot::channel();
    tx.send(client.search("anything").await).unwrap();
    app.tasks.search_rx = Some((1, rx));

    app.check_pending().await;

    assert_eq!(app.search_results.len(), 1);
    assert_eq!(app.search_results[0].title, "Kept");
    assert!(app.last_error.as_deref().unwrap_or_default().starts_with("Search failed"));
  }

  #[tokio::test]
  async fn empty_result_list_sets_error_without_mode_change() {
    let mut app = test_app();
    app.search_generation = 1;
    let (tx, rx) = oneshot::channel();
    tx.send(Ok(Vec::new())).unwrap();
    app.tasks.search_rx = Some((1, rx));

    app.check_pending().await;

    assert_eq!(app.last_error.as_deref(), Some("No results found."));
    assert_eq!(app.mode, AppMode::Input);
  }

  #[test]
  fn blank_input_does_not_trigger_a_search() {
    let mut app = test_app();
    app.input = "   ".to_string();
    app.trigger_search();
    assert!(app.tasks.search_rx.is_none());
    assert_eq!(app.search_generation, 0);
    assert!(app.status_message.is_none());
  }

  // --- posters ---

  fn test_image() -> DynamicImage {
    DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb([1, 2, 3])))
  }

  #[test]
  fn poster_request_skips_results_without_a_poster_url() {
    let mut app = test_app();
    app.search_results = vec![summary("1", "No Pic", "a$u")];
    app.list_state.select(Some(0));

    app.request_poster();

    assert!(app.tasks.poster_rx.is_none());
  }

  #[test]
  fn poster_request_skips_already_cached_result() {
    let mut app = test_app();
    let mut entry = summary("1", "Cached", "a$u");
    entry.thumbnail_url = "http://img.example/1.jpg".to_string();
    app.search_results = vec![entry];
    app.list_state.select(Some(0));
    app.poster = Some(("1".to_string(), test_image()));

    app.request_poster();

    assert!(app.tasks.poster_rx.is_none());
  }

  #[tokio::test]
  async fn delivered_poster_is_cached_by_result_id() {
    let mut app = test_app();
    let (tx, rx) = oneshot::channel();
    tx.send(Some(test_image())).unwrap();
    app.tasks.poster_rx = Some(("7".to_string(), rx));

    app.check_pending().await;

    assert!(app.tasks.poster_rx.is_none());
    let (id, image) = app.poster.as_ref().unwrap();
    assert_eq!(id, "7");
    assert_eq!(image.width(), 1);
  }

  #[tokio::test]
  async fn failed_poster_fetch_leaves_cache_empty_without_error() {
    let mut app = test_app();
    let (tx, rx) = oneshot::channel();
    tx.send(None).unwrap();
    app.tasks.poster_rx = Some(("7".to_string(), rx));

    app.check_pending().await;

    assert!(app.poster.is_none());
    assert!(app.last_error.is_none());
  }

  // --- episode selection ---

  #[tokio::test]
  async fn selecting_episode_two_moves_selection_and_keeps_list() {
    let mut app = test_app();
    app.playlist = Playlist::from_raw("a$u1#b$u2#c$u3");
    // No current_title, so play_selected is a no-op and mpv never spawns.

    app.select_episode(2).await;

    assert_eq!(app.playlist.selected_ordinal(), Some(2));
    assert_eq!(app.episode_cursor, 1);
    let urls: Vec<&str> = app.playlist.episodes().iter().map(|e| e.url.as_str()).collect();
    assert_eq!(urls, vec!["u1", "u2", "u3"]);
  }

  #[tokio::test]
  async fn out_of_range_selection_is_rejected() {
    let mut app = test_app();
    app.playlist = Playlist::from_raw("a$u1#b$u2");

    app.select_episode(5).await;

    assert_eq!(app.playlist.selected_ordinal(), Some(1));
    assert_eq!(app.episode_cursor, 0);
  }

  // --- chrome guard across player entry/exit ---

  #[tokio::test]
  async fn closing_player_restores_chrome_and_clears_title_state() {
    let mut app = test_app();
    app.search_results = vec![summary("1", "T", "a$u")];
    app.mode = AppMode::Player;
    app.current_title = Some(summary("1", "T", "a$u"));
    app.playlist = Playlist::from_raw("a$u");
    app.chrome_guard.acquire(&mut app.chrome_visible);
    assert!(!app.chrome_visible);

    app.close_player().await;

    assert!(app.chrome_visible);
    assert!(app.current_title.is_none());
    assert!(app.playlist.is_empty());
    assert_eq!(app.mode, AppMode::Results);
  }

  #[tokio::test]
  async fn open_player_with_empty_playlist_reports_no_episodes() {
    let mut app = test_app();
    app.search_results = vec![summary("1", "Broken", "")];
    app.list_state.select(Some(0));

    app.open_player().await;

    assert_eq!(app.mode, AppMode::Player);
    assert!(app.playlist.is_empty());
    assert_eq!(app.last_error.as_deref(), Some("No playable episodes."));
    assert!(!app.chrome_visible);
  }

  #[test]
  fn expired_errors_are_cleared() {
    let mut app = test_app();
    app.set_error("boom".to_string());
    app.error_time = Instant::now().checked_sub(Duration::from_secs(constants().error_dismiss_secs + 1));
    app.expire_error();
    assert!(app.last_error.is_none());
  }
}
