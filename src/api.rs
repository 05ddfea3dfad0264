//! HTTP client for the MacCMS-style `provide/vod` listing API.
//!
//! One GET per user-initiated search, no retry, no caching. Only the
//! `list` field of the response is consumed.

use anyhow::{Context, anyhow};
use image::DynamicImage;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::constants::constants;

/// Errors surfaced by [`VodClient::search`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
  /// The query was empty or whitespace-only; no request was issued.
  #[error("empty search query")]
  EmptyQuery,
  /// The request could not be sent, timed out, or came back non-2xx.
  #[error("search request failed: {0}")]
  Request(#[source] reqwest::Error),
  /// The server answered, but not with a well-formed listing body.
  #[error("invalid search response: {0}")]
  InvalidResponse(#[source] reqwest::Error),
}

/// One search-result entry describing a playable title.
///
/// Immutable once received; the raw play list is decoded lazily by
/// [`crate::episodes::parse_episodes`] when the title is opened.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoSummary {
  #[serde(rename = "vod_id")]
  pub id: String,
  #[serde(rename = "vod_name")]
  pub title: String,
  #[serde(rename = "vod_pic", default)]
  pub thumbnail_url: String,
  #[serde(rename = "vod_remarks", default)]
  pub remarks: String,
  #[serde(rename = "vod_blurb", default)]
  pub synopsis: String,
  #[serde(rename = "vod_play_url", default)]
  pub raw_play_list: String,
}

/// Envelope returned by the listing API. Everything except `list` is
/// pagination bookkeeping we accept but do not act on.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
  #[serde(default)]
  pub code: i64,
  #[serde(default)]
  pub msg: String,
  #[serde(default)]
  pub page: i64,
  #[serde(default)]
  pub pagecount: i64,
  #[serde(default)]
  pub limit: i64,
  #[serde(default)]
  pub total: i64,
  #[serde(default)]
  pub list: Vec<VideoSummary>,
}

#[derive(Debug, Clone)]
pub struct VodClient {
  http: Client,
  base_url: String,
}

impl VodClient {
  pub fn new(base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { http: Client::new(), base_url }
  }

  /// Search the listing API for `query`. Exactly one attempt per call.
  ///
  /// A blank query is rejected locally without touching the network.
  pub async fn search(&self, query: &str) -> Result<Vec<VideoSummary>, SearchError> {
    let query = query.trim();
    if query.is_empty() {
      return Err(SearchError::EmptyQuery);
    }

    let url = format!("{}{}", self.base_url, constants().search_path);
    debug!(url = %url, query = %query, "issuing search request");

    let response = self
      .http
      .get(&url)
      .query(&[("ac", "videolist"), ("wd", query)])
      .header("Accept", "application/json")
      .header("Content-Type", "application/json")
      .header("User-Agent", constants().user_agent.as_str())
      .send()
      .await
      .map_err(SearchError::Request)?
      .error_for_status()
      .map_err(SearchError::Request)?;

    let body: SearchResponse = response.json().await.map_err(SearchError::InvalidResponse)?;
    if body.code != 1 {
      debug!(code = body.code, msg = %body.msg, "listing API returned a non-success code");
    }
    debug!(
      page = body.page,
      pagecount = body.pagecount,
      limit = body.limit,
      total = body.total,
      returned = body.list.len(),
      "search response received"
    );
    Ok(body.list)
  }

  /// Fetch and decode the poster image behind a result's `vod_pic` URL.
  ///
  /// Best-effort: a missing or broken poster is an error the caller can
  /// drop, never something that invalidates the search result itself.
  pub async fn fetch_poster(&self, url: &str) -> anyhow::Result<DynamicImage> {
    if url.trim().is_empty() {
      return Err(anyhow!("result has no poster URL"));
    }

    let response = self
      .http
      .get(url)
      .header("User-Agent", constants().user_agent.as_str())
      .send()
      .await
      .with_context(|| format!("Failed to fetch poster from {}", url))?
      .error_for_status()
      .with_context(|| format!("Poster request rejected for {}", url))?;

    let bytes = response.bytes().await.with_context(|| format!("Failed to read poster bytes from {}", url))?;
    image::load_from_memory(&bytes).with_context(|| format!("Failed to decode poster image from {}", url))
  }
}
