//! The clean module rewrites every raw text file of a book into a cleaned sibling
//! file: boilerplate and spoilers are cut from reviews, transcripts are corrected
//! by the language model.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::constants::{
    CLEANED_SUFFIX, DOWNLOAD_APP_MARKER, PAGE_TAGLINE, RAW_EXTENSION, SPOILER_MARKER,
    VIDEO_CLEAN_PROMPT,
};
use crate::model::{ModelContext, complete_prompt};

/// Counters of a cleaning run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CleanReport {
    pub cleaned: usize,
    /// Raw files whose cleaned sibling already exists
    pub skipped: usize,
    pub failed: usize,
}

/// Cleans the text of a review page.
///
/// Pages without the download-app marker are not real review pages and are
/// returned unchanged. Otherwise everything from the spoiler marker on is dropped
/// and, when the page tagline is present, only the text after it is kept.
pub fn clean_website_text(raw: &str) -> String {
    if !raw.contains(DOWNLOAD_APP_MARKER) {
        return raw.to_string();
    }

    let text = match raw.find(SPOILER_MARKER) {
        Some(position) => raw.get(..position).unwrap_or(raw),
        None => raw,
    };

    match text.split_once(PAGE_TAGLINE) {
        Some((_, after)) => after.to_string(),
        None => text.to_string(),
    }
}

/// Corrects a speech-to-text transcript with the language model.
///
/// # Errors
///
/// Returns an error if the model call fails; there is no fallback.
pub async fn clean_video_text(ctx: &ModelContext<'_>, raw: &str) -> Result<String> {
    complete_prompt(ctx, &VIDEO_CLEAN_PROMPT.replace("{text}", raw)).await
}

/// Returns the path of the cleaned sibling of a raw file: `<stem>_cleaned.txt`.
pub fn cleaned_path(raw_path: &Path) -> PathBuf {
    let stem = raw_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    raw_path.with_file_name(format!("{stem}{CLEANED_SUFFIX}"))
}

/// Checks whether a file is the output of a cleaner.
pub fn is_cleaned_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(CLEANED_SUFFIX))
}

/// Lists raw text files of a directory, sorted by name, never including cleaned files.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn raw_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Unable to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|extension| extension == RAW_EXTENSION)
        })
        .filter(|path| !is_cleaned_file(path))
        .collect();
    files.sort();

    Ok(files)
}

/// Cleans every raw review file of a `website` directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed. A file that cannot be
/// read or written is logged and counted as failed.
pub fn clean_website_dir(dir: &Path) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    if !dir.exists() {
        warn!("Website directory {} does not exist, skipping cleaning", dir.display());
        return Ok(report);
    }

    for raw_path in raw_files(dir)? {
        let output_path = cleaned_path(&raw_path);
        if output_path.exists() {
            report.skipped += 1;
            continue;
        }

        let result = std::fs::read_to_string(&raw_path)
            .with_context(|| format!("Unable to read {}", raw_path.display()))
            .and_then(|raw| {
                std::fs::write(&output_path, clean_website_text(&raw))
                    .with_context(|| format!("Unable to write {}", output_path.display()))
            });

        match result {
            Ok(()) => {
                info!("Cleaned {}", raw_path.display());
                report.cleaned += 1;
            }
            Err(err) => {
                error!("{err:#}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Cleans every raw transcript of a `video` directory with the language model.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed. A failing model call is
/// logged and counted; that transcript stays uncleaned.
pub async fn clean_video_dir(ctx: &ModelContext<'_>, dir: &Path) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    if !dir.exists() {
        warn!("Video directory {} does not exist, skipping cleaning", dir.display());
        return Ok(report);
    }

    let files = raw_files(dir)?;
    if files.is_empty() {
        info!("No video transcript files found in {}", dir.display());
    }

    for raw_path in files {
        let output_path = cleaned_path(&raw_path);
        if output_path.exists() {
            report.skipped += 1;
            continue;
        }

        info!("Cleaning {}", raw_path.display());
        match clean_video_file(ctx, &raw_path, &output_path).await {
            Ok(()) => report.cleaned += 1,
            Err(err) => {
                error!("Unable to clean {}: {err:#}", raw_path.display());
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn clean_video_file(ctx: &ModelContext<'_>, raw_path: &Path, output_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(raw_path)
        .with_context(|| format!("Unable to read {}", raw_path.display()))?;
    let cleaned = clean_video_text(ctx, &raw).await?;
    std::fs::write(output_path, cleaned)
        .with_context(|| format!("Unable to write {}", output_path.display()))
}
