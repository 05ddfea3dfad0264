//! External media-player collaborator.
//!
//! Playback is delegated entirely to mpv: we hand it a URL plus view-mode
//! and rate parameters, then talk to its JSON IPC socket for pause and
//! speed changes. mpv's internal buffering is opaque to the app.

use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::{
  io::{AsyncBufReadExt, BufReader},
  process::{Child, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info};

use crate::constants::constants;
use crate::display::ViewMode;
use crate::episodes::Episode;

/// What the player is currently rendering.
#[derive(Debug, Clone)]
pub struct NowPlaying {
  /// Title of the loaded video (from the search result).
  pub title: String,
  pub episode: Episode,
}

pub struct VideoPlayer {
  pub view_mode: ViewMode,
  pub now_playing: Option<NowPlaying>,
  pub paused: bool,
  pub rate: f64,
  current_process: Option<Child>,
  monitor_handle: Option<JoinHandle<()>>,
  status_rx: Option<mpsc::Receiver<String>>,
  last_status: Option<String>,
  ipc_socket_path: Option<String>,
}

impl VideoPlayer {
  pub fn new(view_mode: ViewMode) -> Self {
    Self {
      view_mode,
      now_playing: None,
      paused: false,
      rate: 1.0,
      current_process: None,
      monitor_handle: None,
      status_rx: None,
      last_status: None,
      ipc_socket_path: None,
    }
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  /// Drain any queued status lines from mpv's stdout monitor.
  pub fn check_status(&mut self) {
    if let Some(rx) = &mut self.status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_status = Some(status);
      }
    }
  }

  pub fn last_status(&self) -> Option<&str> {
    self.last_status.as_deref()
  }

  /// Start playing an episode, replacing any current playback.
  ///
  /// An episode whose play list segment had no URL fails here with a
  /// plain error; the episode list itself is never invalidated by one
  /// unplayable entry.
  pub async fn play(&mut self, title: &str, episode: Episode) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;

    if episode.url.is_empty() {
      return Err(anyhow!("episode {} of '{}' has no playable URL", episode.ordinal, title));
    }

    let socket_path = std::env::temp_dir().join(format!("suikan-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    info!(title = %title, ordinal = episode.ordinal, url = %episode.url, "starting playback");

    let mut cmd = Command::new("mpv");
    cmd.args([
      "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | ${pause} ${percent-pos}%",
      &format!("--force-media-title={} · {}", title, episode.display_label()),
      &format!("--speed={}", self.rate),
      &format!("--input-ipc-server={}", socket_path_str),
    ]);
    if self.view_mode == ViewMode::Fullscreen {
      cmd.arg("--fs");
    }
    cmd.arg("--").arg(&episode.url);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // Send stderr to null — if piped but never drained, the pipe buffer
    // fills and mpv blocks.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get mpv stdout")?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = BufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    self.current_process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    self.now_playing = Some(NowPlaying { title: title.to_string(), episode });
    self.paused = false;
    Ok(())
  }

  pub async fn toggle_pause(&mut self) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let payload = serde_json::json!({ "command": ["cycle", "pause"] });
    self.send_ipc(socket_path.clone(), payload).await?;
    self.paused = !self.paused;
    Ok(())
  }

  /// Adjust the playback rate by `delta`, clamped to the configured bounds.
  /// The new rate sticks for subsequent episodes too.
  pub async fn adjust_rate(&mut self, delta: f64) -> Result<()> {
    let target = (self.rate + delta).clamp(constants().rate_min, constants().rate_max);
    if (target - self.rate).abs() < f64::EPSILON {
      return Ok(());
    }
    if let Some(socket_path) = self.ipc_socket_path.clone() {
      let payload = serde_json::json!({ "command": ["set_property", "speed", target] });
      self.send_ipc(socket_path, payload).await?;
    }
    debug!(rate = target, "playback rate changed");
    self.rate = target;
    Ok(())
  }

  async fn send_ipc(&self, socket_path: String, payload: serde_json::Value) -> Result<()> {
    let stream =
      tokio::net::UnixStream::connect(&socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.writable().await.context("mpv IPC socket not writable")?;
    let mut cmd = payload.to_string();
    cmd.push('\n');
    let written = stream.try_write(cmd.as_bytes()).context("Failed to write to mpv IPC socket")?;
    if written < cmd.len() {
      return Err(anyhow!("Partial write to mpv IPC socket: wrote {} of {} bytes", written, cmd.len()));
    }
    Ok(())
  }

  /// Stop playback and clean up. Safe to call when nothing is playing.
  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.status_rx = None;
    self.last_status = None;

    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }

    self.now_playing = None;
    self.paused = false;

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn episode(ordinal: usize, url: &str) -> Episode {
    Episode { ordinal, label: format!("第{}集", ordinal), url: url.to_string() }
  }

  #[tokio::test]
  async fn playing_an_episode_without_url_fails_without_spawning() {
    let mut player = VideoPlayer::new(ViewMode::Windowed);
    let err = player.play("Some Title", episode(2, "")).await.unwrap_err();
    assert!(err.to_string().contains("no playable URL"));
    assert!(!player.is_playing());
    assert!(player.now_playing.is_none());
  }

  #[tokio::test]
  async fn stop_when_idle_is_a_no_op() {
    let mut player = VideoPlayer::new(ViewMode::Windowed);
    player.stop().await.unwrap();
    assert!(!player.is_playing());
  }

  #[tokio::test]
  async fn rate_adjustment_without_playback_clamps_to_bounds() {
    let mut player = VideoPlayer::new(ViewMode::Windowed);
    // No IPC socket yet, so this only updates local state.
    player.adjust_rate(10.0).await.unwrap();
    assert_eq!(player.rate, constants().rate_max);
    player.adjust_rate(-100.0).await.unwrap();
    assert_eq!(player.rate, constants().rate_min);
  }

  #[tokio::test]
  async fn pause_without_playback_is_a_no_op() {
    let mut player = VideoPlayer::new(ViewMode::Windowed);
    player.toggle_pause().await.unwrap();
    assert!(!player.paused);
  }
}
