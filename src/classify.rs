//! The classify module splits every cleaned text of a book into plot, feeling,
//! evaluation and reflection passages using the language model.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::Path;

use crate::clean::cleaned_path;
use crate::constants::{
    EVALUATION_PROMPT, FEELING_PROMPT, NOT_PRESENT, PLOT_PROMPT, REFLECTION_PROMPT,
};
use crate::dataset::{ReviewRecord, write_dataset};
use crate::model::{ModelContext, complete_prompt};
use crate::storage::{ContentItem, Storage};

/// Semantic category of a review passage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Category {
    Plot,
    Feeling,
    Evaluation,
    Reflection,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Plot,
        Category::Feeling,
        Category::Evaluation,
        Category::Reflection,
    ];

    /// Returns the lowercase name of the category.
    pub fn label(self) -> &'static str {
        match self {
            Category::Plot => "plot",
            Category::Feeling => "feeling",
            Category::Evaluation => "evaluation",
            Category::Reflection => "reflection",
        }
    }

    fn extraction_prompt(self) -> &'static str {
        match self {
            Category::Plot => PLOT_PROMPT,
            Category::Feeling => FEELING_PROMPT,
            Category::Evaluation => EVALUATION_PROMPT,
            Category::Reflection => REFLECTION_PROMPT,
        }
    }
}

/// The four passages extracted from one text.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Classification {
    pub plot: String,
    pub feeling: String,
    pub evaluation: String,
    pub reflection: String,
}

impl Classification {
    /// Builds the record of an item from its classification.
    pub fn into_record(self, item: &ContentItem) -> ReviewRecord {
        ReviewRecord {
            source: item.source,
            source_url: item.source_url.clone(),
            plot_text: self.plot,
            feeling_text: self.feeling,
            evaluation_text: self.evaluation,
            reflection_text: self.reflection,
        }
    }
}

impl ReviewRecord {
    /// Returns the text of one category.
    pub fn text(&self, category: Category) -> &str {
        match category {
            Category::Plot => &self.plot_text,
            Category::Feeling => &self.feeling_text,
            Category::Evaluation => &self.evaluation_text,
            Category::Reflection => &self.reflection_text,
        }
    }
}

/// Asks the model for the sentences of `text` that belong to `category`.
///
/// Empty answers and answers consisting of the sentinel are returned as the sentinel.
///
/// # Errors
///
/// Returns an error if the model call fails.
pub async fn extract_category(
    ctx: &ModelContext<'_>,
    category: Category,
    text: &str,
) -> Result<String> {
    let prompt = category.extraction_prompt().replace("{review}", text);
    let answer = complete_prompt(ctx, &prompt)
        .await
        .with_context(|| format!("Unable to extract {} passages", category.label()))?;

    Ok(normalize_answer(&answer))
}

fn normalize_answer(answer: &str) -> String {
    let answer = answer.trim();
    if answer.is_empty() || answer.trim_end_matches('.') == NOT_PRESENT.trim_end_matches('.') {
        NOT_PRESENT.to_string()
    } else {
        answer.to_string()
    }
}

/// Classifies one cleaned text with four independent model calls.
///
/// # Errors
///
/// Returns an error if any of the calls fails; no category is substituted.
pub async fn classify_text(ctx: &ModelContext<'_>, text: &str) -> Result<Classification> {
    Ok(Classification {
        plot: extract_category(ctx, Category::Plot, text).await?,
        feeling: extract_category(ctx, Category::Feeling, text).await?,
        evaluation: extract_category(ctx, Category::Evaluation, text).await?,
        reflection: extract_category(ctx, Category::Reflection, text).await?,
    })
}

/// Counters of a classification run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ClassifyReport {
    pub classified: usize,
    /// Items without a cleaned text
    pub missing: usize,
    pub failed: usize,
}

/// Classifies every cleaned item of a book and writes the dataset files.
///
/// Items are processed in the order they were fetched. An item without a cleaned
/// file is skipped; a failing item is logged and left out of the dataset.
///
/// # Errors
///
/// Returns an error if the book has no manifest or the dataset cannot be written.
pub async fn classify_book(ctx: &ModelContext<'_>, book_dir: &Path) -> Result<ClassifyReport> {
    let storage = Storage::open_existing(book_dir)?.with_context(|| {
        format!(
            "No manifest in {}, nothing has been fetched yet",
            book_dir.display()
        )
    })?;

    let mut report = ClassifyReport::default();
    let mut records = Vec::new();

    for item in storage.list_items()? {
        let path = cleaned_path(&item.raw_path);
        if !path.exists() {
            warn!("No cleaned text for {} ({}), skipping", item.content_id, item.source);
            report.missing += 1;
            continue;
        }

        info!("Classifying {}", path.display());
        let result = match std::fs::read_to_string(&path) {
            Ok(text) => classify_text(ctx, &text).await,
            Err(err) => Err(anyhow::anyhow!("Unable to read {}: {err}", path.display())),
        };

        match result {
            Ok(classification) => {
                debug!("{} classified: {classification:?}", path.display());
                records.push(classification.into_record(&item));
                report.classified += 1;
            }
            Err(err) => {
                error!("Unable to classify {}: {err:#}", path.display());
                report.failed += 1;
            }
        }
    }

    if records.is_empty() {
        warn!("No review was classified for {}", book_dir.display());
    }
    write_dataset(book_dir, &records)?;
    info!(
        "Classified {} texts, {} without cleaned text, {} failed",
        report.classified, report.missing, report.failed
    );

    Ok(report)
}
