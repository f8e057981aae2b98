//! The video_search module finds review videos of a book on Bilibili when no
//! URL list is given.

use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::constants::{BILIBILI_REFERER, BILIBILI_SEARCH_URL, USER_AGENT};

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("Failed to compile TAG regex"));
static NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d.]+").expect("Failed to compile NUMBER regex"));

/// Suffixes appended to the title: review, interpretation, analysis, reading notes, recommendation.
const KEYWORD_SUFFIXES: [&str; 5] = ["书评", "解读", "分析", "读后感", "推荐"];

/// Settings of the video search.
#[derive(Clone, Debug)]
pub struct VideoSearchConfig {
    pub search_url: String,
    /// Shorter videos are ignored
    pub min_duration_secs: u64,
    /// How many of the most played videos are returned
    pub max_results: usize,
    /// Pause between keyword queries
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for VideoSearchConfig {
    fn default() -> Self {
        Self {
            search_url: BILIBILI_SEARCH_URL.to_string(),
            min_duration_secs: 300,
            max_results: 10,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// A video found by the search.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VideoCandidate {
    pub bvid: String,
    pub title: String,
    pub author: String,
    pub duration_secs: u64,
    pub play_count: u64,
    pub url: String,
}

/// Searches Bilibili for review videos of a book.
pub struct VideoSearch {
    config: VideoSearchConfig,
    client: reqwest::Client,
}

impl VideoSearch {
    /// Creates a search with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: VideoSearchConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::REFERER,
            reqwest::header::HeaderValue::from_static(BILIBILI_REFERER),
        );
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context("Unable to build HTTP client")?;

        Ok(Self { config, client })
    }

    /// Returns the most played long-enough videos about the book, without duplicates.
    ///
    /// A failing keyword query is logged and skipped.
    pub async fn search_videos(&self, title: &str) -> Vec<VideoCandidate> {
        info!("Searching videos about {title}");
        let mut videos = Vec::new();

        for (index, suffix) in KEYWORD_SUFFIXES.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.delay).await;
            }

            let keyword = format!("{title} {suffix}");
            match self.search_keyword(&keyword).await {
                Ok(found) => videos.extend(found),
                Err(err) => warn!("Search for '{keyword}' failed: {err:#}"),
            }
        }

        let videos = rank_videos(videos, self.config.max_results);
        info!("Found {} videos about {title}", videos.len());
        videos
    }

    async fn search_keyword(&self, keyword: &str) -> Result<Vec<VideoCandidate>> {
        let response: Value = self
            .client
            .get(&self.config.search_url)
            .query(&[
                ("search_type", "video"),
                ("keyword", keyword),
                ("order", "totalrank"),
                ("duration", "3"),
                ("page", "1"),
                ("page_size", "20"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_search_response(&response, self.config.min_duration_secs)
    }
}

/// Parses one search API response, keeping videos of at least `min_duration_secs`.
///
/// # Errors
///
/// Returns an error if the API reports a non-zero code.
pub fn parse_search_response(response: &Value, min_duration_secs: u64) -> Result<Vec<VideoCandidate>> {
    let code = response.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != 0 {
        anyhow::bail!(
            "API returned code {code}: {}",
            response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
        );
    }

    let results = response
        .pointer("/data/result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(results
        .iter()
        .filter_map(parse_video)
        .filter(|video| video.duration_secs >= min_duration_secs)
        .collect())
}

fn parse_video(item: &Value) -> Option<VideoCandidate> {
    let bvid = item.get("bvid").and_then(Value::as_str)?.to_string();
    if bvid.is_empty() {
        return None;
    }
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let play_count = match item.get("play") {
        Some(Value::Number(number)) => number.as_u64().unwrap_or_default(),
        Some(Value::String(play)) => parse_play_count(play),
        _ => 0,
    };

    Some(VideoCandidate {
        url: format!("https://www.bilibili.com/video/{bvid}"),
        title: strip_tags(&text("title")),
        author: text("author"),
        duration_secs: parse_duration(&text("duration")),
        play_count,
        bvid,
    })
}

/// Parses `mm:ss` or `hh:mm:ss` into seconds; anything else is 0.
pub fn parse_duration(duration: &str) -> u64 {
    let parts: Option<Vec<u64>> = duration
        .trim()
        .split(':')
        .map(|part| part.trim().parse().ok())
        .collect();

    match parts.as_deref() {
        Some([minutes, seconds]) => minutes * 60 + seconds,
        Some([hours, minutes, seconds]) => hours * 3600 + minutes * 60 + seconds,
        _ => 0,
    }
}

/// Parses play counts such as `12345`, `1.2万` (×10 000) or `3千` (×1 000).
pub fn parse_play_count(play: &str) -> u64 {
    let play = strip_tags(play);
    let multiplier = if play.contains('万') {
        10_000.0
    } else if play.contains('千') {
        1_000.0
    } else {
        1.0
    };

    NUMBER_REGEX
        .find(&play)
        .and_then(|number| number.as_str().parse::<f64>().ok())
        .map(|number| (number * multiplier) as u64)
        .unwrap_or_default()
}

fn strip_tags(text: &str) -> String {
    TAG_REGEX.replace_all(text, "").to_string()
}

/// Removes duplicate videos, sorts by play count (most played first) and keeps `max_results`.
pub fn rank_videos(videos: Vec<VideoCandidate>, max_results: usize) -> Vec<VideoCandidate> {
    let mut seen = HashSet::new();
    let mut unique: Vec<VideoCandidate> = videos
        .into_iter()
        .filter(|video| seen.insert(video.bvid.clone()))
        .collect();
    unique.sort_by(|a, b| b.play_count.cmp(&a.play_count));
    unique.truncate(max_results);
    unique
}

/// Writes a links file readable by [`crate::video::read_url_list`].
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_links_file(path: &Path, title: &str, videos: &[VideoCandidate]) -> Result<()> {
    let mut content = format!(
        "# Videos about {title}\n# Generated at {}\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for (index, video) in videos.iter().enumerate() {
        content.push_str(&format!(
            "# {}. {}\n# Author: {}\n# Duration: {}s\n# Plays: {}\n{}\n\n",
            index + 1,
            video.title,
            video.author,
            video.duration_secs,
            video.play_count,
            video.url
        ));
    }

    std::fs::write(path, content).with_context(|| format!("Unable to write {}", path.display()))?;
    info!("Video links written to {}", path.display());
    Ok(())
}
