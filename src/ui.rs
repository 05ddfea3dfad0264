use image::imageops::FilterType;
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, AppMode};
use crate::constants::constants;
use crate::display::GraphicsMode;
use crate::graphics::PosterWidget;

// --- Palette ---

const ACCENT: Color = Color::Cyan;
const FG: Color = Color::Gray;
const MUTED: Color = Color::DarkGray;
const BORDER: Color = Color::DarkGray;
const ERROR: Color = Color::Red;
const STATUS: Color = Color::Yellow;
const HIGHLIGHT_FG: Color = Color::Black;
const HIGHLIGHT_BG: Color = Color::Cyan;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  app.poster_area = None;
  if app.chrome_visible {
    let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
      Constraint::Length(1),
      Constraint::Min(3),
      Constraint::Length(1),
      Constraint::Length(3),
      Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, header_area);
    render_main(frame, app, main_area);
    render_status(frame, app, status_area);
    render_input(frame, app, input_area);
    render_footer(frame, app, footer_area);
  } else {
    // Player screen: search chrome hidden, the episode grid gets the room.
    let [header_area, main_area, status_area, footer_area] = Layout::vertical([
      Constraint::Length(1),
      Constraint::Min(3),
      Constraint::Length(1),
      Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, header_area);
    render_main(frame, app, main_area);
    render_status(frame, app, status_area);
    render_footer(frame, app, footer_area);
  }
}

fn render_header(frame: &mut Frame, area: Rect) {
  let left = Line::from(Span::styled(" ▶ 随看 suikan ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(MUTED)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  match app.mode {
    AppMode::Player => render_player(frame, app, area),
    AppMode::Results if !app.search_results.is_empty() => render_results(frame, app, area),
    _ => render_welcome(frame, area),
  }
}

fn render_welcome(frame: &mut Frame, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▶  随看", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Search series, movies and shows. Play them with mpv.", Style::default().fg(FG))),
    Line::from(""),
    Line::from(Span::styled("Type a query below and press Enter.", Style::default().fg(MUTED))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered().border_type(ratatui::widgets::BorderType::Rounded).border_style(Style::default().fg(BORDER)),
  );
  frame.render_widget(paragraph, area);
}

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let [list_area, poster_area] =
    Layout::horizontal([Constraint::Min(40), Constraint::Percentage(30)]).areas(area);

  render_result_list(frame, app, list_area);
  render_poster(frame, app, poster_area);
}

fn render_result_list(frame: &mut Frame, app: &mut App, area: Rect) {
  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .search_results
    .iter()
    .map(|summary| {
      let remarks = summary.remarks.as_str();
      let line = if remarks.is_empty() {
        let title = truncate_str(&summary.title, inner_w);
        Line::from(Span::styled(title, Style::default().fg(FG)))
      } else {
        // Reserve space for the remarks on the right + 2-char gap
        let right_w = display_width(remarks, remarks.chars().count());
        let title_max = inner_w.saturating_sub(right_w + 2);
        let title = truncate_str(&summary.title, title_max);
        let title_w = display_width(&title, title.chars().count());
        let gap = inner_w.saturating_sub(title_w + right_w);
        Line::from(vec![
          Span::styled(title, Style::default().fg(FG)),
          Span::raw(" ".repeat(gap)),
          Span::styled(remarks.to_string(), Style::default().fg(MUTED)),
        ])
      };
      ListItem::new(line)
    })
    .collect();

  let title = format!(" Results — {} ", app.search_results.len());
  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(BORDER)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(HIGHLIGHT_FG).bg(HIGHLIGHT_BG).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);

  // Synopsis of the highlighted entry along the bottom border
  if let Some(selected) = app.list_state.selected()
    && let Some(summary) = app.search_results.get(selected)
    && !summary.synopsis.is_empty()
    && area.height > 2
  {
    let synopsis = truncate_str(summary.synopsis.trim(), inner_w);
    let line = Line::from(Span::styled(format!(" {} ", synopsis), Style::default().fg(MUTED)));
    let bottom = Rect { y: area.y + area.height - 1, height: 1, x: area.x + 2, width: area.width.saturating_sub(4) };
    frame.render_widget(line, bottom);
  }
}

/// Poster pane for the highlighted result. Cell-based graphics modes
/// render into the buffer here; the protocol modes only record the pane
/// so the run loop can send the image after the draw.
fn render_poster(frame: &mut Frame, app: &mut App, area: Rect) {
  let block = Block::bordered()
    .title(" 封面 Poster ")
    .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(BORDER));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  if inner.is_empty() {
    return;
  }

  let Some(summary) = app.highlighted_result() else { return };
  let highlighted_id = summary.id.clone();
  let has_url = !summary.thumbnail_url.trim().is_empty();

  if !app.poster.as_ref().is_some_and(|(id, _)| *id == highlighted_id) {
    let fetching = app.tasks.poster_rx.as_ref().is_some_and(|(id, _)| *id == highlighted_id);
    let text = if fetching { "Loading…" } else if has_url { "" } else { "No poster." };
    frame.render_widget(Paragraph::new(Span::styled(text, Style::default().fg(MUTED))), inner);
    return;
  }

  if app.graphics_mode.uses_protocol() {
    app.poster_area = Some(inner);
    return;
  }

  let needs_resize = match &app.poster_resized {
    Some((id, w, h, _)) => *id != highlighted_id || *w != inner.width || *h != inner.height,
    None => true,
  };
  if needs_resize && let Some((_, image)) = &app.poster {
    // Half blocks pack two pixel rows per cell row; ASCII gets one.
    let target_h = match app.graphics_mode {
      GraphicsMode::HalfBlock => inner.height as u32 * 2,
      _ => inner.height as u32,
    };
    let resized = image.resize((inner.width as u32).max(1), target_h.max(1), FilterType::Lanczos3);
    app.poster_resized = Some((highlighted_id, inner.width, inner.height, resized));
  }

  if let Some((_, _, _, resized)) = &app.poster_resized {
    frame.render_widget(PosterWidget { image: resized, mode: app.graphics_mode }, inner);
  }
}

fn render_player(frame: &mut Frame, app: &mut App, area: Rect) {
  let [info_area, episodes_area] =
    Layout::vertical([Constraint::Length(7), Constraint::Min(3)]).areas(area);

  render_now_playing(frame, app, info_area);
  render_episode_grid(frame, app, episodes_area);
}

fn render_now_playing(frame: &mut Frame, app: &App, area: Rect) {
  let info_title = Line::from(vec![
    Span::styled(" Now Playing ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", app.player.view_mode.label()), Style::default().fg(MUTED)),
  ]);
  let info_block = Block::bordered()
    .title(info_title)
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(BORDER))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let title = app.current_title.as_ref().map(|s| s.title.as_str()).unwrap_or("");

  let mut lines =
    vec![Line::from(Span::styled(truncate_str(title, inner_w), Style::default().fg(FG).add_modifier(Modifier::BOLD)))];

  if let Some(now) = &app.player.now_playing {
    let pause_label = if app.player.paused { "paused" } else { "playing" };
    lines.push(Line::from(vec![
      Span::styled("Episode   ", Style::default().fg(MUTED)),
      Span::styled(
        format!("{} ({}/{})", now.episode.display_label(), now.episode.ordinal, app.playlist.len()),
        Style::default().fg(FG),
      ),
    ]));
    lines.push(Line::from(vec![
      Span::styled("Rate      ", Style::default().fg(MUTED)),
      Span::styled(format!("{:.2}x · {}", app.player.rate, pause_label), Style::default().fg(FG)),
    ]));
    lines.push(Line::from(Span::styled(
      truncate_str(&now.episode.url, inner_w),
      Style::default().fg(ACCENT).add_modifier(Modifier::UNDERLINED),
    )));
  } else {
    lines.push(Line::from(Span::styled("Nothing playing.", Style::default().fg(MUTED))));
  }

  let paragraph = Paragraph::new(lines).block(info_block);
  frame.render_widget(paragraph, area);
}

fn render_episode_grid(frame: &mut Frame, app: &App, area: Rect) {
  let block = Block::bordered()
    .title(" 选集 Episodes ")
    .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(BORDER))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  if app.playlist.is_empty() {
    let msg = Paragraph::new(Span::styled("This title has no episodes.", Style::default().fg(MUTED)));
    frame.render_widget(msg, inner);
    return;
  }

  let columns = constants().episode_grid_columns.max(1);
  let cell_w = (inner.width as usize / columns).max(8);
  let selected = app.playlist.selected_ordinal();

  // Keep the cursor's row in view on small terminals.
  let visible_rows = inner.height as usize;
  let cursor_row = app.episode_cursor / columns;
  let first_row = cursor_row.saturating_sub(visible_rows.saturating_sub(1));

  let mut lines: Vec<Line> = Vec::new();
  for (row_idx, row) in app.playlist.episodes().chunks(columns).enumerate().skip(first_row) {
    if row_idx - first_row >= visible_rows {
      break;
    }
    let mut spans: Vec<Span> = Vec::new();
    for episode in row {
      let is_selected = selected == Some(episode.ordinal);
      let is_cursor = app.episode_cursor + 1 == episode.ordinal;
      let marker = if is_selected { "▶ " } else { "  " };
      let label = truncate_str(&episode.display_label(), cell_w.saturating_sub(4));
      let text = format!("{}{}", marker, label);
      let pad = cell_w.saturating_sub(display_width(&text, text.chars().count()));

      let mut style = Style::default().fg(if is_selected { ACCENT } else { FG });
      if is_selected {
        style = style.add_modifier(Modifier::BOLD);
      }
      if is_cursor {
        style = style.add_modifier(Modifier::REVERSED);
      }
      spans.push(Span::styled(text, style));
      spans.push(Span::raw(" ".repeat(pad)));
    }
    lines.push(Line::from(spans));
  }

  frame.render_widget(Paragraph::new(lines), inner);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(STATUS))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(ERROR))
  } else {
    match app.player.last_status() {
      Some(status) => (format!(" ▶ {}", status), Style::default().fg(STATUS)),
      None => (" Ready".to_string(), Style::default().fg(MUTED)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let border_color = if app.mode == AppMode::Input { ACCENT } else { BORDER };
  let input_block = Block::bordered()
    .title(" Search ")
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(FG)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let has_results = !app.search_results.is_empty();
  let is_playing = app.player.is_playing();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Search")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      if has_results {
        k.push(("↓", "Results"));
        k.push(("Esc", "Results"));
      } else {
        k.push(("Esc", "Quit"));
      }
      k
    }
    AppMode::Results => {
      let mut k = vec![("Enter", "Play"), ("j/k", "Navigate")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      k.push(("^f", "View mode"));
      k.push(("Esc", "Back"));
      k
    }
    AppMode::Player => {
      let pause_label = if app.player.paused { "Resume" } else { "Pause" };
      vec![
        ("Enter", "Play episode"),
        ("h/j/k/l", "Navigate"),
        ("Space", pause_label),
        ("[ ]", "Rate"),
        ("Esc", "Back"),
      ]
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(HIGHLIGHT_FG).bg(MUTED)),
        Span::styled(format!(" {} ", action), Style::default().fg(MUTED)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let mode_label = format!("{} ", app.player.view_mode.label());
  let right = Line::from(Span::styled(&mode_label, Style::default().fg(MUTED)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(mode_label.len() as u16), width: mode_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
