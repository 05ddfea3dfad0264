//! Terminal poster rendering.
//!
//! Listing results carry a cover image URL; depending on what the
//! terminal supports the decoded image is drawn as ASCII shades,
//! true-color half blocks, or pixel-perfect Kitty/Sixel graphics.
//! The cell-based modes render into the ratatui buffer; the protocol
//! modes bypass it and write escape sequences after each draw.

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use color_quant::NeuQuant;
use image::{DynamicImage, ImageFormat};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};
use std::io::{Cursor, Write};

use crate::display::GraphicsMode;

// --- Poster Widget (cell-based modes) ---

pub struct PosterWidget<'a> {
  pub image: &'a DynamicImage,
  pub mode: GraphicsMode,
}

const SHADES: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for PosterWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.mode {
      GraphicsMode::HalfBlock => render_half_block(self.image, area, buf),
      GraphicsMode::Ascii => render_ascii(self.image, area, buf),
      // Protocol modes are written directly to stdout after the draw.
      GraphicsMode::Kitty | GraphicsMode::Sixel => {}
    }
  }
}

fn cell(area: Rect, offset_x: u32, offset_y: u32, x: u32, y: u32) -> (u16, u16) {
  (
    area.x.saturating_add((offset_x.saturating_add(x)).min(u16::MAX as u32) as u16),
    area.y.saturating_add((offset_y.saturating_add(y)).min(u16::MAX as u32) as u16),
  )
}

/// Two pixels per cell via the upper-half-block glyph: the glyph's
/// foreground is the upper pixel, its background the lower one.
fn render_half_block(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  // The caller resized to the cell grid's pixel dimensions already.
  let pixels = image.to_rgb8();
  let img_w = pixels.width().min(area.width as u32);
  let img_h = pixels.height();
  let rows = img_h.div_ceil(2);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(rows) / 2;

  for y in 0..rows.min(area.height as u32) {
    for x in 0..img_w {
      let upper = pixels.get_pixel(x, y * 2);
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if y * 2 + 1 < img_h {
        let lower = pixels.get_pixel(x, y * 2 + 1);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      let (cx, cy) = cell(area, offset_x, offset_y, x, y);
      buf.set_string(cx, cy, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let pixels = image.to_luma8();
  let img_w = pixels.width().min(area.width as u32);
  let img_h = pixels.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let luma = pixels.get_pixel(x, y)[0];
      let idx = ((luma as f32 / 255.0) * (SHADES.len() - 1) as f32).round() as usize;
      let (cx, cy) = cell(area, offset_x, offset_y, x, y);
      buf.set_string(cx, cy, SHADES[idx.min(SHADES.len() - 1)], Style::default());
    }
  }
}

// --- Kitty Graphics Protocol ---
//
//   Transmit:  \x1B_G a=T,f=100,t=d,i=1,p=1,c=<cols>,r=<rows>,q=2,m=1;<base64 chunk>\x1B\\
//   Continue:  \x1B_G m=1;<base64 chunk>\x1B\\
//   Last:      \x1B_G m=0;<base64 chunk>\x1B\\
//   Delete all: \x1B_G a=d,d=a,q=2\x1B\\
//
// A fixed image ID (`i=1`) plus placement ID (`p=1`) makes re-sends an
// atomic replacement with no visible gap. The image is PNG-encoded,
// base64'd, and sent in <=4096-byte chunks; `c`/`r` let the terminal
// scale it over the target cell area at native pixel density.

const KITTY_CHUNK_SIZE: usize = 4096;

/// Delete every Kitty image currently on screen. Used when the poster
/// pane disappears and on exit.
pub fn kitty_delete_all() -> Result<()> {
  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B_Ga=d,d=a,q=2\x1B\\").context("Failed to write kitty delete")?;
  stdout.flush().context("Failed to flush kitty delete")?;
  Ok(())
}

/// Render an image at `area` using the Kitty graphics protocol.
pub fn kitty_render_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  let mut png_buf = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut png_buf), ImageFormat::Png)
    .context("Failed to encode poster as PNG for kitty")?;

  let b64 = BASE64.encode(&png_buf);
  let chunks: Vec<&[u8]> = b64.as_bytes().chunks(KITTY_CHUNK_SIZE).collect();
  let last = chunks.len().saturating_sub(1);

  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B[{};{}H", area.y.saturating_add(1), area.x.saturating_add(1))
    .context("Failed to position cursor for kitty image")?;

  for (i, chunk) in chunks.iter().enumerate() {
    let data = std::str::from_utf8(chunk).context("base64 chunk was not valid UTF-8")?;
    let more = if i < last { 1 } else { 0 };
    if i == 0 {
      write!(stdout, "\x1B_Ga=T,f=100,t=d,i=1,p=1,c={},r={},q=2,m={};{}\x1B\\", area.width, area.height, more, data)
        .context("Failed to write kitty image header chunk")?;
    } else {
      write!(stdout, "\x1B_Gm={};{}\x1B\\", more, data).context("Failed to write kitty image continuation chunk")?;
    }
  }

  stdout.flush().context("Failed to flush kitty image")?;
  Ok(())
}

// --- Sixel Graphics Protocol ---
//
// DCS q <data> ST, with DCS = \x1BP and ST = \x1B\\. Each sixel row is
// 6 vertical pixels; a data char is 0x3F plus a 6-bit column bitmap.
// `$` rewinds to the row start (for the next color pass), `-` advances
// a row. Colors go through registers, quantized to 256 with NeuQuant.

const SIXEL_MAX_COLORS: usize = 256;

/// Render an image at `area` using the Sixel graphics protocol.
pub fn sixel_render_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  // Sixel has no cell-scaling parameter, so resize to the area's pixel
  // dimensions here (8x16 px cells is the common case).
  let pixel_w = area.width as u32 * 8;
  let pixel_h = area.height as u32 * 16;
  let resized = image.resize(pixel_w, pixel_h, image::imageops::FilterType::Lanczos3).into_rgb8();
  let (w, h) = (resized.width() as usize, resized.height() as usize);

  let rgba_pixels: Vec<u8> = resized.pixels().flat_map(|p| [p[0], p[1], p[2], 255]).collect();
  let nq = NeuQuant::new(3, SIXEL_MAX_COLORS, &rgba_pixels);
  let color_map = nq.color_map_rgb();
  let palette: Vec<[u8; 3]> = (0..SIXEL_MAX_COLORS)
    .map(|i| {
      let start = i * 3;
      color_map.get(start..start + 3).and_then(|s| s.try_into().ok()).unwrap_or([0, 0, 0])
    })
    .collect();

  // NeuQuant was built with 256 colors, so index_of() stays in 0..=255.
  let indices: Vec<u8> =
    resized.pixels().map(|p| nq.index_of(&[p[0], p[1], p[2], 255]).min(u8::MAX as usize) as u8).collect();

  let mut out = String::with_capacity(w * h);
  out.push_str("\x1BPq");
  out.push_str(&format!("\"1;1;{};{}", w, h));

  for (i, c) in palette.iter().enumerate() {
    let r_pct = (c[0] as u32 * 100) / 255;
    let g_pct = (c[1] as u32 * 100) / 255;
    let b_pct = (c[2] as u32 * 100) / 255;
    out.push_str(&format!("#{};2;{};{};{}", i, r_pct, g_pct, b_pct));
  }

  let sixel_rows = h.div_ceil(6);
  for sr in 0..sixel_rows {
    let y_base = sr * 6;

    for color_idx in 0..palette.len() {
      let color_idx_u8 = color_idx.min(u8::MAX as usize) as u8;
      let mut has_pixels = false;
      let mut row_data = Vec::with_capacity(w);

      for x in 0..w {
        let mut sixel_val: u8 = 0;
        for bit in 0..6 {
          let y = y_base + bit;
          if y < h
            && let Some(&idx) = indices.get(y * w + x)
            && idx == color_idx_u8
          {
            sixel_val |= 1 << bit;
            has_pixels = true;
          }
        }
        row_data.push(sixel_val);
      }

      if !has_pixels {
        continue;
      }

      out.push_str(&format!("#{}", color_idx));

      // Run-length encode: `!<n><ch>` repeats ch n times.
      let mut i = 0;
      while i < row_data.len() {
        let val = row_data[i];
        let ch = (val + 0x3F) as char;
        let mut run = 1usize;
        while i + run < row_data.len() && row_data[i + run] == val {
          run += 1;
        }
        if run > 3 {
          out.push_str(&format!("!{}{}", run, ch));
        } else {
          for _ in 0..run {
            out.push(ch);
          }
        }
        i += run;
      }
      out.push('$');
    }
    out.push('-');
  }

  out.push_str("\x1B\\");

  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B[{};{}H{}", area.y.saturating_add(1), area.x.saturating_add(1), out)
    .context("Failed to write sixel image")?;
  stdout.flush().context("Failed to flush sixel image")?;
  Ok(())
}
