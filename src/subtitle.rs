//! The subtitle module turns downloaded subtitle files into plain transcript text.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("Failed to compile TAG regex"));
static ASS_OVERRIDE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("Failed to compile ASS override regex"));

/// Supported subtitle formats.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubtitleFormat {
    Vtt,
    Srt,
    Ass,
}

impl SubtitleFormat {
    /// Detects the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("vtt") => Some(Self::Vtt),
            Some("srt") => Some(Self::Srt),
            Some("ass") | Some("ssa") => Some(Self::Ass),
            _ => None,
        }
    }
}

/// Extracts the spoken text of a subtitle file, one cue per line.
///
/// Timing lines, cue numbers, headers and markup are dropped. Consecutive
/// identical lines, common in rolling auto-generated captions, are collapsed.
pub fn extract_text(format: SubtitleFormat, content: &str) -> String {
    let lines: Vec<String> = match format {
        SubtitleFormat::Vtt => vtt_lines(content),
        SubtitleFormat::Srt => srt_lines(content),
        SubtitleFormat::Ass => ass_lines(content),
    };

    let mut text: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if text.last() != Some(&line) {
            text.push(line);
        }
    }
    text.join("\n")
}

fn vtt_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut in_note = false;
    let raw: Vec<&str> = content.lines().map(str::trim).collect();

    for (index, &line) in raw.iter().enumerate() {
        if line.is_empty() {
            in_note = false;
            continue;
        }
        // cue identifier
        if raw.get(index + 1).is_some_and(|next| next.contains("-->")) {
            continue;
        }
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            in_note = true;
            continue;
        }
        if in_note || line.starts_with("WEBVTT") || line.contains("-->") {
            continue;
        }
        if line.starts_with("Kind:") || line.starts_with("Language:") {
            continue;
        }

        let line = TAG_REGEX.replace_all(line, "").trim().to_string();
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines
}

fn srt_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim().trim_start_matches('\u{feff}'))
        .filter(|line| !line.is_empty())
        .filter(|line| !line.chars().all(|c| c.is_ascii_digit()))
        .filter(|line| !line.contains("-->"))
        .map(|line| TAG_REGEX.replace_all(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn ass_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Dialogue:"))
        // Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
        .filter_map(|fields| fields.splitn(10, ',').nth(9))
        .map(|text| {
            ASS_OVERRIDE_REGEX
                .replace_all(text, "")
                .replace("\\N", " ")
                .replace("\\n", " ")
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Finds a subtitle file downloaded next to a video, e.g. `<stem>.zh-Hans.vtt`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn find_subtitle(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let prefix = format!("{stem}.");
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Unable to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .filter(|path| SubtitleFormat::from_path(path).is_some())
        .collect();
    candidates.sort();

    Ok(candidates.into_iter().next())
}

/// Reads a subtitle file and returns its transcript text.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has an unknown extension.
pub fn read_subtitle(path: &Path) -> Result<String> {
    let format = SubtitleFormat::from_path(path)
        .with_context(|| format!("Unknown subtitle format: {}", path.display()))?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read {}", path.display()))?;

    Ok(extract_text(format, &content))
}
