//! The website module crawls long-form reviews of a book from the review website
//! and stores them as raw text files under the book's `website` directory.

use anyhow::{Context, Result};
use log::{error, info, warn};
use rand::Rng;
use regex::Regex;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_REVIEW_PATTERN, DEFAULT_SEARCH_URL, DEFAULT_SUBJECT_URL, RAW_EXTENSION,
    REVIEWS_PAGE_SIZE, USER_AGENT, WEBSITE_DIR,
};
use crate::identify::{extract_subject_id, review_id};
use crate::parse::{extract_article, extract_review_urls, parse_search_results};
use crate::storage::{ContentItem, Storage};
use crate::{Source, TextBy};

/// Settings of the review website crawler.
#[derive(Clone, Debug)]
pub struct ReviewSiteConfig {
    /// Search page URL, `{}` is replaced with the url-encoded title
    pub search_url: String,
    /// Book detail page URL, `{}` is replaced with the subject id
    pub subject_url: String,
    /// Prefix of the text-extraction proxy; empty to fetch pages directly
    pub reader_url: String,
    /// Local extraction method used when no proxy is configured
    pub text_by: TextBy,
    /// How many search results are crawled for reviews
    pub limit: usize,
    /// How many review index pages are read per book
    pub pages: u32,
    /// Pattern matching review permalinks in index pages
    pub review_pattern: String,
    /// Random delay between review fetches, in milliseconds
    pub delay_ms: RangeInclusive<u64>,
    /// Upper bound for a single request
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ReviewSiteConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            subject_url: DEFAULT_SUBJECT_URL.to_string(),
            reader_url: String::new(),
            text_by: TextBy::default(),
            limit: 2,
            pages: 5,
            review_pattern: DEFAULT_REVIEW_PATTERN.to_string(),
            delay_ms: 10_000..=15_000,
            timeout: Duration::from_secs(60),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Result of crawling one book.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum CrawlOutcome {
    /// A previous run already completed the crawl; nothing was requested.
    AlreadyExists,
    /// The search yielded no book; nothing was written.
    NotFound,
    /// The crawl ran.
    Crawled(CrawlReport),
}

/// Counters of a crawl run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CrawlReport {
    /// Reviews fetched and written in this run
    pub fetched: usize,
    /// Reviews already on disk from an earlier run
    pub skipped: usize,
    /// Reviews whose fetch failed or whose id could not be derived
    pub failed: usize,
    /// Review index pages that failed to load and ended pagination early
    pub index_failed: usize,
}

/// Crawler of the book review website.
pub struct ReviewSite {
    config: ReviewSiteConfig,
    client: reqwest::Client,
    review_pattern: Regex,
}

impl ReviewSite {
    /// Creates a crawler with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the review pattern is not a valid regex or the client cannot be built
    pub fn new(config: ReviewSiteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .context("Unable to build HTTP client")?;
        let review_pattern = Regex::new(&config.review_pattern)
            .with_context(|| format!("Invalid review pattern: {}", config.review_pattern))?;

        Ok(Self {
            config,
            client,
            review_pattern,
        })
    }

    /// Crawls reviews of a book into `<book_dir>/website/<id>.txt`.
    ///
    /// A crawl recorded as complete in the manifest is not repeated. Reviews already
    /// on disk are skipped, so an interrupted crawl resumes where it stopped.
    ///
    /// # Arguments
    ///
    /// * `book_dir` - The book's working directory
    /// * `title` - The book title to search for
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or the output directory cannot be written.
    /// Failing HTTP requests are logged and skipped.
    pub async fn crawl_book(&self, book_dir: &Path, title: &str) -> Result<CrawlOutcome> {
        if let Some(storage) = Storage::open_existing(book_dir)?
            && let Some(completed_at) = storage.crawl_completed_at(Source::Douban)?
        {
            info!("Reviews of {title} were already crawled at {completed_at}, skipping");
            return Ok(CrawlOutcome::AlreadyExists);
        }

        let book_urls = match self.search_book(title).await {
            Ok(book_urls) if !book_urls.is_empty() => book_urls,
            Ok(_) => {
                warn!("Book {title} not found");
                return Ok(CrawlOutcome::NotFound);
            }
            Err(err) => {
                error!("Search for {title} failed: {err:#}");
                return Ok(CrawlOutcome::NotFound);
            }
        };

        let mut review_urls = Vec::new();
        let mut index_failed = 0;
        for book_url in book_urls.iter().take(self.config.limit) {
            let (urls, complete) = self.review_urls(book_url).await;
            review_urls.extend(urls);
            if !complete {
                index_failed += 1;
            }
        }
        let review_urls = dedup_in_order(review_urls);
        info!("Found {} reviews of {title}", review_urls.len());

        let storage = Storage::open(book_dir)?;
        let website_dir = book_dir.join(WEBSITE_DIR);
        std::fs::create_dir_all(&website_dir)
            .with_context(|| format!("Unable to create {}", website_dir.display()))?;

        let mut report = self
            .fetch_reviews(&storage, &website_dir, &review_urls)
            .await?;
        report.index_failed = index_failed;

        if review_urls.is_empty() {
            warn!("No reviews of {title} collected, the next run will look again");
        } else if report.failed > 0 || report.index_failed > 0 {
            warn!(
                "{} reviews and {} index pages of {title} failed, the next run will retry them",
                report.failed, report.index_failed
            );
        } else {
            storage.mark_crawl_complete(Source::Douban)?;
        }

        info!(
            "Crawled {title}: {} fetched, {} already present, {} failed",
            report.fetched, report.skipped, report.failed
        );
        Ok(CrawlOutcome::Crawled(report))
    }

    /// Searches the website and returns detail page URLs of matching books.
    ///
    /// # Errors
    ///
    /// Returns an error if the search request fails.
    pub async fn search_book(&self, title: &str) -> Result<Vec<String>> {
        let query: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
        let search_url = self.config.search_url.replace("{}", &query);
        let html = self.get_text(&search_url).await?;

        Ok(parse_search_results(&html)
            .into_iter()
            .filter_map(|link| match extract_subject_id(&link) {
                Some(subject_id) => Some(self.config.subject_url.replace("{}", &subject_id)),
                None => {
                    warn!("No subject id in search result {link}, skipping");
                    None
                }
            })
            .collect())
    }

    /// Collects review permalinks from the book's review index pages.
    ///
    /// A failing page ends pagination; the links gathered so far are returned
    /// together with `false`. The flag is `true` when every page loaded.
    pub async fn review_urls(&self, book_url: &str) -> (Vec<String>, bool) {
        let mut reviews = Vec::new();
        for page in 0..self.config.pages {
            let mut reviews_url = format!("{book_url}reviews/");
            if page > 0 {
                reviews_url.push_str(&format!(
                    "?sort=hotest&start={}",
                    page * REVIEWS_PAGE_SIZE
                ));
            }

            match self.get_text(&self.proxied(&reviews_url)).await {
                Ok(text) => reviews.extend(extract_review_urls(&text, &self.review_pattern)),
                Err(err) => {
                    error!("Unable to read review page {reviews_url}: {err:#}");
                    return (reviews, false);
                }
            }
        }

        (reviews, true)
    }

    async fn fetch_reviews(
        &self,
        storage: &Storage,
        website_dir: &Path,
        review_urls: &[String],
    ) -> Result<CrawlReport> {
        let mut report = CrawlReport::default();
        let mut fetched_any = false;

        for review_url in review_urls {
            let Some(content_id) = review_id(review_url) else {
                warn!("No review id in {review_url}, skipping");
                report.failed += 1;
                continue;
            };

            let raw_path = website_dir.join(format!("{content_id}.{RAW_EXTENSION}"));
            if raw_path.exists() {
                if !storage.has_item(Source::Douban, &content_id)? {
                    storage.record_item(&ContentItem::new(
                        Source::Douban,
                        review_url,
                        &content_id,
                        raw_path,
                    ))?;
                }
                report.skipped += 1;
                continue;
            }

            if fetched_any {
                tokio::time::sleep(random_delay(&self.config.delay_ms)).await;
            }
            fetched_any = true;

            match self.fetch_review(review_url).await {
                Ok(text) => {
                    std::fs::write(&raw_path, text)
                        .with_context(|| format!("Unable to write {}", raw_path.display()))?;
                    storage.record_item(&ContentItem::new(
                        Source::Douban,
                        review_url,
                        &content_id,
                        raw_path,
                    ))?;
                    info!("Saved review {review_url}");
                    report.fetched += 1;
                }
                Err(err) => {
                    error!("Unable to fetch review {review_url}: {err:#}");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Fetches the readable text of a review, through the reader proxy when configured.
    async fn fetch_review(&self, review_url: &str) -> Result<String> {
        if self.config.reader_url.is_empty() {
            let html = self.get_text(review_url).await?;
            return Ok(extract_article(&html, self.config.text_by)?.into_text());
        }

        self.get_text(&self.proxied(review_url)).await
    }

    fn proxied(&self, url: &str) -> String {
        format!("{}{url}", self.config.reader_url)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

fn dedup_in_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn random_delay(range: &RangeInclusive<u64>) -> Duration {
    let millis = if range.is_empty() {
        *range.start()
    } else {
        rand::thread_rng().gen_range(range.clone())
    };
    Duration::from_millis(millis)
}
