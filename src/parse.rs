//! The parse module extracts links and readable text from fetched pages.

use crate::TextBy;

use anyhow::Result;
use dom_smoothie::{Article, CandidateSelectMode, Config, Readability, TextMode};
use html2md;
use regex::Regex;
use scraper::{Html, Selector as ScraperSelector};

/// Represents an article extracted from a webpage.
///
/// This struct contains the title and text content of the article.
#[derive(Debug)]
pub struct PageArticle {
    /// The title of the article, if available.
    pub title: Option<String>,
    /// The text content of the article.
    pub text: String,
}

impl PageArticle {
    /// Renders the article as the plain text stored for a review.
    pub fn into_text(self) -> String {
        match self.title {
            Some(title) => format!("Title: {title}\n\n{}", self.text),
            None => self.text,
        }
    }
}

/// Extracts an article from the given HTML content.
///
/// This is the local counterpart of the reader proxy, used when no proxy is configured.
///
/// # Arguments
///
/// * `html` - A string slice that holds the HTML content of the webpage.
/// * `text_by` - The method to use for text extraction (dom_smoothie or fast_html2md).
///
/// # Errors
///
/// This function will return an error if dom_smoothie fails to extract the article.
pub fn extract_article(html: &str, text_by: TextBy) -> Result<PageArticle> {
    let title = parse_title(html);

    match text_by {
        TextBy::DomSmoothie => {
            let config = Config {
                text_mode: TextMode::Markdown,
                candidate_select_mode: CandidateSelectMode::DomSmoothie,
                ..Default::default()
            };

            let mut readability = Readability::new(html, None, Some(config))?;
            let article: Article = readability.parse()?;

            Ok(PageArticle {
                title,
                text: article.text_content.to_string(),
            })
        }
        TextBy::FastHtml2Md => {
            let text = html2md::parse_html(html, false);
            Ok(PageArticle { title, text })
        }
    }
}

/// Parses the title from HTML content
fn parse_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for tag in ["title", "h1"] {
        if let Ok(tag_selector) = ScraperSelector::parse(tag)
            && let Some(tag_element) = document.select(&tag_selector).next()
        {
            let tag_text = tag_element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
            if !tag_text.is_empty() {
                return Some(tag_text);
            }
        }
    }

    None
}

/// Collects the link of every search result, i.e. the first anchor inside each `<h3>` heading.
///
/// Headings without an anchor are ignored; order follows the document.
pub fn parse_search_results(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let (Ok(heading), Ok(anchor)) = (
        ScraperSelector::parse("h3"),
        ScraperSelector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    document
        .select(&heading)
        .filter_map(|result| result.select(&anchor).next())
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

/// Finds every review permalink in a page body, in order of appearance.
pub fn extract_review_urls(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect()
}
