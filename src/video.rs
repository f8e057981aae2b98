//! The video module downloads audio of review videos and turns it into transcripts
//! under the book's `video` directory.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::Source;
use crate::constants::{RAW_EXTENSION, VIDEO_DIR};
use crate::identify::{VideoId, video_content_id};
use crate::storage::{ContentItem, Storage};
use crate::subtitle::{find_subtitle, read_subtitle};

/// Settings of the video transcript fetcher.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    /// Language passed to speech-to-text
    pub language: String,
    /// Whisper model name
    pub whisper_model: String,
    /// Highest video resolution downloaded when audio-only is unavailable
    pub max_height: u32,
    /// Pause between consecutive downloads
    pub delay: Duration,
    /// Upper bound for a single external tool run
    pub timeout: Duration,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            language: "zh".to_string(),
            whisper_model: "large-v3".to_string(),
            max_height: 720,
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Downloads audio and produces transcripts.
pub trait MediaBackend {
    /// Downloads the audio track of `url` to `audio_path` (mp3).
    ///
    /// Subtitles may be written next to the audio as `<stem>.<lang>.<vtt|srt|ass>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails; no partial audio is left behind.
    fn download_audio(
        &self,
        video: &VideoId,
        url: &str,
        audio_path: &Path,
    ) -> impl Future<Output = Result<()>>;

    /// Runs speech-to-text over an audio file.
    ///
    /// # Errors
    ///
    /// Returns an error if the recognizer fails or produces no output.
    fn transcribe(&self, audio_path: &Path) -> impl Future<Output = Result<String>>;
}

/// Media backend running `yt-dlp`, `lux`, `ffmpeg` and `whisper` as subprocesses.
pub struct ExternalTools {
    config: VideoConfig,
}

impl ExternalTools {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    async fn download_youtube(&self, url: &str, audio_path: &Path) -> Result<()> {
        let template = audio_path.with_extension("%(ext)s");
        let format = format!("bestaudio/best[height<={}]", self.config.max_height);
        run_tool(
            "yt-dlp",
            &[
                "-f",
                &format,
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                &format!("{}.*", self.config.language),
                "-o",
                &template.to_string_lossy(),
                url,
            ],
            self.config.timeout,
        )
        .await
    }

    async fn download_bilibili(&self, url: &str, audio_path: &Path) -> Result<()> {
        let dir = audio_path.parent().context("Audio path has no directory")?;
        let stem = audio_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .context("Audio path has no file name")?;
        let video_path = audio_path.with_extension("mp4");

        run_tool(
            "lux",
            &["-o", &dir.to_string_lossy(), "-O", stem, url],
            self.config.timeout,
        )
        .await?;
        run_tool(
            "ffmpeg",
            &[
                "-y",
                "-i",
                &video_path.to_string_lossy(),
                "-vn",
                "-acodec",
                "libmp3lame",
                "-q:a",
                "2",
                &audio_path.to_string_lossy(),
            ],
            self.config.timeout,
        )
        .await?;

        std::fs::remove_file(&video_path)
            .with_context(|| format!("Unable to remove {}", video_path.display()))
    }
}

impl MediaBackend for ExternalTools {
    async fn download_audio(&self, video: &VideoId, url: &str, audio_path: &Path) -> Result<()> {
        let result = match video.source {
            Source::Bilibili => self.download_bilibili(url, audio_path).await,
            Source::YouTube | Source::Douban => self.download_youtube(url, audio_path).await,
        };

        if result.is_err() {
            remove_partial_download(audio_path);
        }
        result
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let stem = audio_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .context("Audio path has no file name")?;
        let output_dir = audio_path.with_file_name(format!(".whisper-{stem}"));

        let result = run_tool(
            "whisper",
            &[
                &audio_path.to_string_lossy(),
                "--model",
                &self.config.whisper_model,
                "--language",
                &self.config.language,
                "--output_format",
                "txt",
                "--output_dir",
                &output_dir.to_string_lossy(),
            ],
            self.config.timeout,
        )
        .await
        .and_then(|()| {
            let transcript_path = output_dir.join(format!("{stem}.{RAW_EXTENSION}"));
            std::fs::read_to_string(&transcript_path)
                .with_context(|| format!("Unable to read {}", transcript_path.display()))
        });

        if output_dir.exists()
            && let Err(err) = std::fs::remove_dir_all(&output_dir)
        {
            warn!("Unable to remove {}: {err}", output_dir.display());
        }

        result.map(|text| text.trim().to_string())
    }
}

/// Runs an external tool, failing on timeout or a non-zero exit status.
async fn run_tool(program: &str, args: &[&str], timeout: Duration) -> Result<()> {
    info!("Running {program}");
    let output = tokio::time::timeout(
        timeout,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("{program} timed out after {timeout:?}"))?
    .map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!("{program} is not installed")
        } else {
            anyhow::anyhow!("Failed to run {program}: {err}")
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        anyhow::bail!(
            "{program} exited with {}: {}",
            output.status,
            tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
        );
    }

    Ok(())
}

fn remove_partial_download(audio_path: &Path) {
    let partials = [
        audio_path.to_path_buf(),
        audio_path.with_extension("mp4"),
        audio_path.with_extension("webm"),
        audio_path.with_extension("m4a"),
        audio_path.with_extension("part"),
        audio_path.with_extension(""),
    ];
    for partial in partials.iter().filter(|path| path.is_file()) {
        if let Err(err) = std::fs::remove_file(partial) {
            warn!("Unable to remove partial download {}: {err}", partial.display());
        }
    }
}

/// Counters of a video batch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct VideoReport {
    /// Videos transcribed in this run
    pub transcribed: usize,
    /// Videos whose transcript already existed
    pub already_done: usize,
    /// URLs that belong to no supported platform
    pub unrecognized: usize,
    /// Videos whose download or transcription failed
    pub failed: usize,
}

enum UrlOutcome {
    AlreadyDone,
    Transcribed { downloaded: bool },
}

/// Fetches transcripts of review videos of one book.
pub struct VideoFetcher<B: MediaBackend = ExternalTools> {
    book_dir: PathBuf,
    delay: Duration,
    backend: B,
}

impl<B: MediaBackend> VideoFetcher<B> {
    pub fn new(book_dir: &Path, delay: Duration, backend: B) -> Self {
        Self {
            book_dir: book_dir.to_path_buf(),
            delay,
            backend,
        }
    }

    /// Downloads and transcribes every URL, skipping work already on disk.
    ///
    /// A failing URL is logged and counted; the batch continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the video directory or the manifest cannot be written.
    pub async fn process_urls(&self, urls: &[String]) -> Result<VideoReport> {
        let mut report = VideoReport::default();
        if urls.is_empty() {
            info!("No video URLs to process");
            return Ok(report);
        }

        let video_dir = self.book_dir.join(VIDEO_DIR);
        std::fs::create_dir_all(&video_dir)
            .with_context(|| format!("Unable to create {}", video_dir.display()))?;
        let storage = Storage::open(&self.book_dir)?;
        let mut downloaded_previous = false;

        for url in urls {
            info!("Processing {url}");
            let Some(video) = video_content_id(url) else {
                warn!("Could not extract video ID from URL: {url}, skipping");
                report.unrecognized += 1;
                continue;
            };

            if downloaded_previous {
                tokio::time::sleep(self.delay).await;
            }

            match self.process_video(&storage, &video_dir, &video, url).await {
                Ok(UrlOutcome::AlreadyDone) => {
                    report.already_done += 1;
                    downloaded_previous = false;
                }
                Ok(UrlOutcome::Transcribed { downloaded }) => {
                    report.transcribed += 1;
                    downloaded_previous = downloaded;
                }
                Err(err) => {
                    error!("Unable to process {url}: {err:#}");
                    report.failed += 1;
                    downloaded_previous = true;
                }
            }
        }

        info!(
            "Videos: {} transcribed, {} already done, {} unrecognized, {} failed",
            report.transcribed, report.already_done, report.unrecognized, report.failed
        );
        Ok(report)
    }

    async fn process_video(
        &self,
        storage: &Storage,
        video_dir: &Path,
        video: &VideoId,
        url: &str,
    ) -> Result<UrlOutcome> {
        let key = video.key();
        let audio_path = video_dir.join(format!("{key}.mp3"));
        let text_path = video_dir.join(format!("{key}.{RAW_EXTENSION}"));
        let item = ContentItem::new(video.source, url, &key, text_path.clone());

        if text_path.exists() {
            info!("Transcript {} already exists, skipping", text_path.display());
            if !storage.has_item(video.source, &key)? {
                storage.record_item(&item)?;
            }
            return Ok(UrlOutcome::AlreadyDone);
        }

        let downloaded = if audio_path.exists() {
            info!("Audio {} already exists, skipping download", audio_path.display());
            false
        } else {
            self.backend
                .download_audio(video, url, &audio_path)
                .await
                .with_context(|| format!("Download of {url} failed"))?;
            true
        };

        let transcript = match find_subtitle(video_dir, &key)? {
            Some(subtitle_path) => {
                info!("Using subtitles {}", subtitle_path.display());
                read_subtitle(&subtitle_path)?
            }
            None => self
                .backend
                .transcribe(&audio_path)
                .await
                .with_context(|| format!("Transcription of {} failed", audio_path.display()))?,
        };

        if transcript.trim().is_empty() {
            anyhow::bail!("Transcript of {url} is empty");
        }

        std::fs::write(&text_path, transcript)
            .with_context(|| format!("Unable to write {}", text_path.display()))?;
        storage.record_item(&item)?;
        info!("Transcription saved to {}", text_path.display());

        Ok(UrlOutcome::Transcribed { downloaded })
    }
}

/// Reads video URLs from a file: one per line, blank lines and `#` comments ignored.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read video URL list {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
