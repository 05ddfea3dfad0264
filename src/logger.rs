//! File-backed tracing setup.
//!
//! The terminal is owned by ratatui, so log output goes to a rolling file
//! in the platform data dir instead of stderr. `RUST_LOG` controls
//! verbosity; the default is `info`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Install the global subscriber. The returned guard must be held for the
/// lifetime of the process so buffered log lines get flushed on exit.
pub fn init() -> Result<WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "suikan").context("could not determine platform directories")?;
  let log_dir = proj_dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).with_context(|| format!("failed to create log dir {}", log_dir.display()))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "suikan.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
    .with(filter)
    .try_init()
    .ok()
    .context("failed to install tracing subscriber")?;

  Ok(guard)
}
