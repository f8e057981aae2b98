//! The dataset module persists classified review records as CSV and JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Source;
use crate::constants::{DATASET_CSV_FILE, DATASET_JSON_FILE, NOT_PRESENT};

/// The four-category classification of one content item.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub source: Source,
    pub source_url: String,
    #[serde(rename = "story")]
    pub plot_text: String,
    #[serde(rename = "feeling")]
    pub feeling_text: String,
    #[serde(rename = "evaluation")]
    pub evaluation_text: String,
    #[serde(rename = "thinking")]
    pub reflection_text: String,
}

/// Checks whether a category text is the "not present" sentinel.
pub fn is_not_present(text: &str) -> bool {
    text.trim() == NOT_PRESENT
}

/// Writes `parsed_data.csv` and `parsed_data.json` into the book directory,
/// replacing the files of an earlier run.
///
/// # Errors
///
/// Returns an error if either file cannot be written.
pub fn write_dataset(book_dir: &Path, records: &[ReviewRecord]) -> Result<()> {
    let csv_path = book_dir.join(DATASET_CSV_FILE);
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("Unable to create {}", csv_path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    let json_path = book_dir.join(DATASET_JSON_FILE);
    std::fs::write(&json_path, serde_json::to_string_pretty(records)?)
        .with_context(|| format!("Unable to write {}", json_path.display()))?;

    Ok(())
}

/// Reads the records of a book back from `parsed_data.csv`, in file order.
///
/// # Errors
///
/// Returns an error if the file is missing or a row is malformed.
pub fn read_dataset(book_dir: &Path) -> Result<Vec<ReviewRecord>> {
    let csv_path = book_dir.join(DATASET_CSV_FILE);
    let mut reader = csv::Reader::from_path(&csv_path)
        .with_context(|| format!("Unable to open {}", csv_path.display()))?;

    reader
        .deserialize::<ReviewRecord>()
        .map(|record| record.context("Malformed review record"))
        .collect()
}
