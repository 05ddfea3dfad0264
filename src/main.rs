mod api;
mod app;
mod config;
mod constants;
mod display;
mod episodes;
mod graphics;
mod input;
mod logger;
mod player;
mod ui;

use anyhow::Result;
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;

use api::VodClient;
use app::App;
use config::Config;
use constants::constants;
use display::GraphicsMode;
use graphics::{kitty_delete_all, kitty_render_image, sixel_render_image};

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Playback view mode: 'auto', 'windowed', or 'fullscreen'
  #[arg(short, long, default_value = "auto")]
  view_mode: display::CliViewMode,

  /// Poster rendering: 'auto', 'kitty', 'sixel', 'half-block', or 'ascii'
  #[arg(short, long, default_value = "auto")]
  graphics_mode: display::CliGraphicsMode,

  /// Override the listing API base URL (also settable via SUIKAN_API_BASE)
  #[arg(long)]
  api_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = logger::init()?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let config = Config::load();
  let api_base = config.resolve_api_base(args.api_base.as_deref());
  let view_mode = display::resolve_view_mode(args.view_mode, config.view_mode.as_deref());
  let graphics_mode = display::resolve_graphics_mode(args.graphics_mode);
  info!(api_base = %api_base, view_mode = view_mode.label(), graphics = graphics_mode.label(), "starting");

  let client = VodClient::new(api_base);
  let mut app = App::new(client, view_mode, graphics_mode, config);

  loop {
    app.check_pending().await;
    app.player.check_status();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if graphics_mode.uses_protocol() {
      if let Some(area) = app.poster_area {
        if let Some((ref id, ref image)) = app.poster {
          let key = (id.clone(), area);
          if app.poster_last_sent.as_ref() != Some(&key) {
            if graphics_mode == GraphicsMode::Kitty {
              kitty_delete_all()?;
              kitty_render_image(image, area)?;
            } else {
              sixel_render_image(image, area)?;
            }
            app.poster_last_sent = Some(key);
          }
        }
      } else if app.poster_last_sent.is_some() {
        if graphics_mode == GraphicsMode::Kitty {
          kitty_delete_all()?;
        }
        app.poster_last_sent = None;
      }
    }

    if event::poll(Duration::from_millis(constants().event_poll_ms))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  if graphics_mode == GraphicsMode::Kitty {
    let _ = kitty_delete_all();
  }
  app.shutdown().await;
  Ok(())
}
