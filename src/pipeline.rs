//! The pipeline module runs the stages of a book in order: video crawl, video
//! cleaning, review crawl, review cleaning, classification and report.

use anyhow::{Context, Result};
use log::{error, info};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::VideoInput;
use crate::classify::classify_book;
use crate::clean::{CleanReport, clean_video_dir, clean_website_dir};
use crate::constants::{VIDEO_DIR, VIDEO_LINKS_FILE, WEBSITE_DIR};
use crate::model::ModelContext;
use crate::report::generate_report;
use crate::video::{ExternalTools, VideoConfig, VideoFetcher, VideoReport, read_url_list};
use crate::video_search::{VideoSearch, VideoSearchConfig, write_links_file};
use crate::website::{CrawlOutcome, ReviewSite, ReviewSiteConfig};

/// Everything one pipeline run needs besides the model.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// The book title
    pub book: String,
    /// The book's working directory
    pub book_dir: PathBuf,
    pub video_input: VideoInput,
    /// How many searched videos are downloaded in auto-search mode
    pub max_videos: usize,
    /// Run every stage without asking
    pub auto: bool,
    pub site: ReviewSiteConfig,
    pub video: VideoConfig,
    pub search: VideoSearchConfig,
}

impl PipelineConfig {
    /// Creates a configuration with default settings, working in `./<book>`.
    pub fn new(book: &str) -> Self {
        Self {
            book: book.to_string(),
            book_dir: PathBuf::from(book),
            video_input: VideoInput::AutoSearch,
            max_videos: 3,
            auto: false,
            site: ReviewSiteConfig::default(),
            video: VideoConfig::default(),
            search: VideoSearchConfig::default(),
        }
    }
}

/// A step of the pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    CrawlVideos,
    CleanVideos,
    CrawlWebsite,
    CleanWebsite,
    Classify,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::CrawlVideos,
        Stage::CleanVideos,
        Stage::CrawlWebsite,
        Stage::CleanWebsite,
        Stage::Classify,
        Stage::Report,
    ];

    fn question(self, book: &str) -> String {
        match self {
            Stage::CrawlVideos => format!("Crawl {book} from video?"),
            Stage::CleanVideos => format!("Clean {book} from video?"),
            Stage::CrawlWebsite => format!("Crawl {book} from website?"),
            Stage::CleanWebsite => format!("Clean {book} from website?"),
            Stage::Classify => format!("Parse {book} reviews?"),
            Stage::Report => format!("Generate report for {book}?"),
        }
    }
}

/// Runs every stage in order.
///
/// Without `auto` each stage asks for confirmation on stdin. A failing stage is
/// logged and the next stage still runs.
///
/// # Errors
///
/// Returns an error only if reading the confirmation fails.
pub async fn run(config: &PipelineConfig, ctx: &ModelContext<'_>) -> Result<()> {
    for stage in Stage::ALL {
        if !config.auto && !confirm(&stage.question(&config.book))? {
            info!("Skipping {stage:?}");
            continue;
        }

        info!("Starting {stage:?} for {}", config.book);
        match run_stage(stage, config, ctx).await {
            Ok(()) => info!("{stage:?} completed"),
            Err(err) => error!("{stage:?} failed: {err:#}"),
        }
    }

    Ok(())
}

/// Runs a single stage.
///
/// # Errors
///
/// Returns the error of the stage.
pub async fn run_stage(stage: Stage, config: &PipelineConfig, ctx: &ModelContext<'_>) -> Result<()> {
    match stage {
        Stage::CrawlVideos => crawl_videos(config).await.map(|_| ()),
        Stage::CleanVideos => clean_video_dir(ctx, &config.book_dir.join(VIDEO_DIR))
            .await
            .map(log_clean_report),
        Stage::CrawlWebsite => crawl_website(config).await.map(|_| ()),
        Stage::CleanWebsite => {
            clean_website_dir(&config.book_dir.join(WEBSITE_DIR)).map(log_clean_report)
        }
        Stage::Classify => classify_book(ctx, &config.book_dir).await.map(|_| ()),
        Stage::Report => generate_report(ctx, &config.book_dir, &config.book)
            .await
            .map(|_| ()),
    }
}

fn log_clean_report(report: CleanReport) {
    info!(
        "Cleaned {} files, {} already clean, {} failed",
        report.cleaned, report.skipped, report.failed
    );
}

/// Crawls the book's reviews from the website.
///
/// # Errors
///
/// Returns an error if the crawler cannot be built or its output cannot be written.
pub async fn crawl_website(config: &PipelineConfig) -> Result<CrawlOutcome> {
    ReviewSite::new(config.site.clone())?
        .crawl_book(&config.book_dir, &config.book)
        .await
}

/// Downloads and transcribes the book's videos.
///
/// # Errors
///
/// Returns an error if the URL list cannot be read or the output cannot be written.
pub async fn crawl_videos(config: &PipelineConfig) -> Result<VideoReport> {
    let urls = resolve_video_urls(config).await?;
    let fetcher = VideoFetcher::new(
        &config.book_dir,
        config.video.delay,
        ExternalTools::new(config.video.clone()),
    );
    fetcher.process_urls(&urls).await
}

/// Returns the video URLs to process: read from the list file, or searched and
/// written to `<book>/video_links.txt` in auto-search mode.
///
/// # Errors
///
/// Returns an error if the list cannot be read or the links file cannot be written.
pub async fn resolve_video_urls(config: &PipelineConfig) -> Result<Vec<String>> {
    match &config.video_input {
        VideoInput::File { path } => read_url_list(Path::new(path)),
        VideoInput::AutoSearch => {
            let videos = VideoSearch::new(config.search.clone())?
                .search_videos(&config.book)
                .await;
            if videos.is_empty() {
                info!("No videos found for {}", config.book);
                return Ok(Vec::new());
            }

            std::fs::create_dir_all(&config.book_dir)
                .with_context(|| format!("Unable to create {}", config.book_dir.display()))?;
            write_links_file(
                &config.book_dir.join(VIDEO_LINKS_FILE),
                &config.book,
                &videos,
            )?;

            Ok(videos
                .into_iter()
                .take(config.max_videos)
                .map(|video| video.url)
                .collect())
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} (Y/N): ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_uppercase().as_str(),
        "Y" | "YES"
    ))
}
