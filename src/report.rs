//! The report module synthesizes the classified reviews of a book into four
//! long-form sections and composes them into one review document.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::classify::Category;
use crate::constants::{
    EVALUATION_SECTION_PROMPT, EVALUATION_SECTION_TASK, FEELING_SECTION_PROMPT,
    FEELING_SECTION_TASK, PLOT_CONTEXT_PROMPT, PLOT_SECTION_PROMPT, REFLECTION_SECTION_PROMPT,
    REFLECTION_SECTION_TASK, REPORT_FILE, REPORT_PROMPT, REPORT_PROMPT_FILE,
};
use crate::dataset::{ReviewRecord, is_not_present, read_dataset};
use crate::model::{ModelContext, complete_prompt, fill_prompt};

/// The generated review of a book.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SynthesizedReview {
    pub plot: String,
    pub feeling: String,
    pub evaluation: String,
    pub reflection: String,
    /// The prompt that composed the document, sections included
    pub prompt: String,
    /// The composed review
    pub document: String,
}

/// Builds the synthesis prompt of one category.
///
/// Every record contributes its text under the label `#<n> <category>:` where `n`
/// is its 1-based position; records without text for the category are left out
/// without renumbering. Categories other than plot are given the synthesized
/// `plot` as context.
pub fn category_prompt(
    book: &str,
    category: Category,
    records: &[ReviewRecord],
    plot: Option<&str>,
) -> String {
    let (header, task) = match category {
        Category::Plot => (PLOT_SECTION_PROMPT, ""),
        Category::Feeling => (FEELING_SECTION_PROMPT, FEELING_SECTION_TASK),
        Category::Evaluation => (EVALUATION_SECTION_PROMPT, EVALUATION_SECTION_TASK),
        Category::Reflection => (REFLECTION_SECTION_PROMPT, REFLECTION_SECTION_TASK),
    };

    let mut prompt = match plot {
        Some(plot) => fill_prompt(PLOT_CONTEXT_PROMPT, &[("book", book), ("plot", plot)]),
        None => String::new(),
    };
    prompt.push_str(&fill_prompt(header, &[("book", book)]));

    for (index, record) in records.iter().enumerate() {
        let text = record.text(category);
        if is_not_present(text) || text.trim().is_empty() {
            continue;
        }
        prompt.push_str(&format!(
            "#{} {}: {}\n",
            index + 1,
            category.label(),
            text.trim()
        ));
    }

    if !task.is_empty() {
        prompt.push('\n');
        prompt.push_str(task);
    }

    prompt
}

async fn synthesize_section(
    ctx: &ModelContext<'_>,
    book: &str,
    category: Category,
    records: &[ReviewRecord],
    plot: Option<&str>,
) -> Result<String> {
    info!("Synthesizing the {} section of {book}", category.label());
    complete_prompt(ctx, &category_prompt(book, category, records, plot))
        .await
        .with_context(|| format!("Unable to synthesize the {} section", category.label()))
}

/// Synthesizes the four sections and composes the review document.
///
/// The plot section is written first; the other three sections are given the
/// plot as context and are requested concurrently.
///
/// # Errors
///
/// Returns an error if any model call fails.
pub async fn synthesize(
    ctx: &ModelContext<'_>,
    book: &str,
    records: &[ReviewRecord],
) -> Result<SynthesizedReview> {
    let plot = synthesize_section(ctx, book, Category::Plot, records, None).await?;

    let (feeling, evaluation, reflection) = tokio::try_join!(
        synthesize_section(ctx, book, Category::Feeling, records, Some(&plot)),
        synthesize_section(ctx, book, Category::Evaluation, records, Some(&plot)),
        synthesize_section(ctx, book, Category::Reflection, records, Some(&plot)),
    )?;

    let prompt = fill_prompt(
        REPORT_PROMPT,
        &[
            ("book", book),
            ("plot", plot.as_str()),
            ("feeling", feeling.as_str()),
            ("evaluation", evaluation.as_str()),
            ("reflection", reflection.as_str()),
        ],
    );

    info!("Composing the review of {book}");
    let document = complete_prompt(ctx, &prompt)
        .await
        .context("Unable to compose the review")?;

    Ok(SynthesizedReview {
        plot,
        feeling,
        evaluation,
        reflection,
        prompt,
        document,
    })
}

/// Reads the classified reviews of a book, synthesizes the review and writes
/// `report_prompt.md` and `report.md`, replacing earlier versions.
///
/// # Errors
///
/// Returns an error if the dataset is missing or empty, a model call fails or
/// a file cannot be written.
pub async fn generate_report(
    ctx: &ModelContext<'_>,
    book_dir: &Path,
    book: &str,
) -> Result<SynthesizedReview> {
    let records = read_dataset(book_dir)?;
    if records.is_empty() {
        anyhow::bail!("No classified reviews for {book}, nothing to synthesize");
    }
    info!("Generating the report of {book} from {} reviews", records.len());

    let review = synthesize(ctx, book, &records).await?;

    let prompt_path = book_dir.join(REPORT_PROMPT_FILE);
    std::fs::write(&prompt_path, &review.prompt)
        .with_context(|| format!("Unable to write {}", prompt_path.display()))?;
    let report_path = book_dir.join(REPORT_FILE);
    std::fs::write(&report_path, &review.document)
        .with_context(|| format!("Unable to write {}", report_path.display()))?;

    info!("Report written to {}", report_path.display());
    Ok(review)
}
