//! Parsing of MacCMS play-list strings and episode selection state.
//!
//! A raw play list packs every episode of a title into one string: `#`
//! separates episodes and `$` separates an episode's label from its URL,
//! e.g. `第1集$https://cdn/ep1.m3u8#第2集$https://cdn/ep2.m3u8`.

/// One selectable playable unit of a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
  /// 1-based position in the play list, contiguous in source order.
  pub ordinal: usize,
  pub label: String,
  pub url: String,
}

impl Episode {
  /// Label for display, falling back to the ordinal when the source
  /// play list carried no label text.
  pub fn display_label(&self) -> String {
    if self.label.is_empty() { format!("EP {}", self.ordinal) } else { self.label.clone() }
  }
}

/// Parse a raw play-list string into episodes.
///
/// Total over any input: empty segments are skipped (so `""` yields an
/// empty list), and a segment with no `$` keeps its ordinal but degrades
/// to an empty URL — playback of such an entry fails at the player, not
/// here. URL well-formedness is not validated.
pub fn parse_episodes(raw: &str) -> Vec<Episode> {
  raw
    .split('#')
    .filter(|segment| !segment.is_empty())
    .enumerate()
    .map(|(i, segment)| match segment.split_once('$') {
      Some((label, url)) => {
        Episode { ordinal: i + 1, label: label.trim().to_string(), url: url.trim().to_string() }
      }
      None => Episode { ordinal: i + 1, label: segment.trim().to_string(), url: String::new() },
    })
    .collect()
}

/// Episode list plus the current selection for one loaded title.
///
/// Selection defaults to the first episode when the parsed list is
/// non-empty and only moves through [`Playlist::select`], which rejects
/// ordinals outside the list.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
  episodes: Vec<Episode>,
  selected: Option<usize>,
}

impl Playlist {
  pub fn from_raw(raw: &str) -> Self {
    let episodes = parse_episodes(raw);
    let selected = if episodes.is_empty() { None } else { Some(1) };
    Self { episodes, selected }
  }

  pub fn episodes(&self) -> &[Episode] {
    &self.episodes
  }

  pub fn len(&self) -> usize {
    self.episodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.episodes.is_empty()
  }

  pub fn selected_ordinal(&self) -> Option<usize> {
    self.selected
  }

  /// The currently selected episode, if any.
  pub fn selected(&self) -> Option<&Episode> {
    self.selected.and_then(|ordinal| self.get(ordinal))
  }

  /// Look up an episode by its 1-based ordinal.
  pub fn get(&self, ordinal: usize) -> Option<&Episode> {
    if ordinal == 0 { None } else { self.episodes.get(ordinal - 1) }
  }

  /// Move the selection to `ordinal`. Returns `false` (leaving the
  /// selection unchanged) when the ordinal is outside the parsed list.
  pub fn select(&mut self, ordinal: usize) -> bool {
    if ordinal >= 1 && ordinal <= self.episodes.len() {
      self.selected = Some(ordinal);
      true
    } else {
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- parse_episodes ---

  #[test]
  fn parse_two_labelled_episodes() {
    let episodes = parse_episodes("a$urlA#b$urlB");
    assert_eq!(
      episodes,
      vec![
        Episode { ordinal: 1, label: "a".to_string(), url: "urlA".to_string() },
        Episode { ordinal: 2, label: "b".to_string(), url: "urlB".to_string() },
      ]
    );
  }

  #[test]
  fn parse_ordinals_are_contiguous_in_source_order() {
    let raw = "第1集$u1#第2集$u2#第3集$u3#第4集$u4";
    let episodes = parse_episodes(raw);
    assert_eq!(episodes.len(), 4);
    for (i, episode) in episodes.iter().enumerate() {
      assert_eq!(episode.ordinal, i + 1);
      assert_eq!(episode.url, format!("u{}", i + 1));
    }
  }

  #[test]
  fn parse_empty_input_yields_empty_list() {
    assert!(parse_episodes("").is_empty());
  }

  #[test]
  fn parse_skips_empty_segments() {
    // A trailing separator must not produce a phantom episode.
    let episodes = parse_episodes("a$urlA#");
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].ordinal, 1);
  }

  #[test]
  fn parse_segment_without_dollar_degrades_to_empty_url() {
    let episodes = parse_episodes("a$urlA#broken#c$urlC");
    assert_eq!(episodes.len(), 3);
    assert_eq!(episodes[1].ordinal, 2);
    assert_eq!(episodes[1].label, "broken");
    assert_eq!(episodes[1].url, "");
    assert_eq!(episodes[2].url, "urlC");
  }

  #[test]
  fn parse_single_episode_no_separator() {
    let episodes = parse_episodes("正片$https://cdn/full.m3u8");
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].label, "正片");
    assert_eq!(episodes[0].url, "https://cdn/full.m3u8");
  }

  #[test]
  fn display_label_falls_back_to_ordinal() {
    let episodes = parse_episodes("$only-a-url");
    assert_eq!(episodes[0].display_label(), "EP 1");
    let episodes = parse_episodes("第2集$url");
    assert_eq!(episodes[0].display_label(), "第2集");
  }

  // --- Playlist ---

  #[test]
  fn playlist_defaults_to_first_episode() {
    let playlist = Playlist::from_raw("a$u1#b$u2#c$u3");
    assert_eq!(playlist.selected_ordinal(), Some(1));
    assert_eq!(playlist.selected().map(|e| e.url.as_str()), Some("u1"));
  }

  #[test]
  fn playlist_empty_input_has_no_selection() {
    let playlist = Playlist::from_raw("");
    assert!(playlist.is_empty());
    assert_eq!(playlist.selected_ordinal(), None);
    assert!(playlist.selected().is_none());
  }

  #[test]
  fn playlist_select_moves_selection_and_keeps_list_intact() {
    let mut playlist = Playlist::from_raw("a$u1#b$u2#c$u3");
    assert!(playlist.select(2));
    assert_eq!(playlist.selected_ordinal(), Some(2));
    // Neighbouring entries are untouched.
    assert_eq!(playlist.get(1).map(|e| e.url.as_str()), Some("u1"));
    assert_eq!(playlist.get(3).map(|e| e.url.as_str()), Some("u3"));
  }

  #[test]
  fn playlist_select_rejects_out_of_range() {
    let mut playlist = Playlist::from_raw("a$u1#b$u2");
    assert!(!playlist.select(0));
    assert!(!playlist.select(3));
    assert_eq!(playlist.selected_ordinal(), Some(1));
  }
}
