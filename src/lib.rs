//! The deepread library scrapes book reviews and video transcripts, cleans them,
//! classifies review passages with an LLM and synthesizes a long-form review.

pub mod classify;
pub mod clean;
pub mod constants;
pub mod dataset;
pub mod identify;
pub mod model;
pub mod parse;
pub mod persona;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod subtitle;
pub mod video;
pub mod video_search;
pub mod website;

use serde::{Deserialize, Serialize};

/// Enum representing where a piece of review material came from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Long-form review from the book website
    Douban,
    /// Transcript of a YouTube video
    #[serde(rename = "youtube")]
    YouTube,
    /// Transcript of a Bilibili video
    Bilibili,
}

impl Source {
    /// Returns the stable lowercase name used in the manifest and dataset.
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Douban => "douban",
            Source::YouTube => "youtube",
            Source::Bilibili => "bilibili",
        }
    }

    /// Returns the file name prefix of video sources.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Source::Douban => None,
            Source::YouTube => Some("ytb"),
            Source::Bilibili => Some("bilibili"),
        }
    }

    /// Returns the per-book subdirectory holding this source's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Source::Douban => constants::WEBSITE_DIR,
            Source::YouTube | Source::Bilibili => constants::VIDEO_DIR,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "douban" => Ok(Source::Douban),
            "youtube" => Ok(Source::YouTube),
            "bilibili" => Ok(Source::Bilibili),
            _ => Err(format!("Invalid source: {}", input)),
        }
    }
}

/// Enum representing the local text extraction method used when no reader proxy is configured.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TextBy {
    /// Use dom_smoothie for text extraction
    #[default]
    DomSmoothie,
    /// Use fast_html2md for text extraction
    FastHtml2Md,
}

impl std::str::FromStr for TextBy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "dom_smoothie" => Ok(TextBy::DomSmoothie),
            "fast_html2md" => Ok(TextBy::FastHtml2Md),
            _ => Err(format!("Invalid text extraction method: {}", input)),
        }
    }
}

/// Enum representing where the video stage takes its URLs from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum VideoInput {
    /// Search the video platform for the book title.
    AutoSearch,
    /// Read URLs from a file, one per line.
    File { path: String },
}

impl std::str::FromStr for VideoInput {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "" => Err("Empty video input".to_string()),
            "auto" => Ok(Self::AutoSearch),
            path => Ok(Self::File {
                path: path.to_string(),
            }),
        }
    }
}

pub use classify::{classify_book, classify_text};
pub use clean::{clean_video_dir, clean_website_dir, clean_website_text};
pub use identify::{extract_subject_id, review_id, video_content_id};
pub use report::{generate_report, synthesize};
pub use video::VideoFetcher;
pub use website::ReviewSite;
