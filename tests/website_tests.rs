use deepread::constants::WEBSITE_DIR;
use deepread::storage::Storage;
use deepread::website::{CrawlOutcome, CrawlReport, ReviewSite, ReviewSiteConfig};
use deepread::{Source, TextBy};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;
use spectral::string::StrAssertions;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

type Handler = dyn Fn(&str, &str) -> (u16, String) + Send + 'static;

/// Review website answering from a handler that gets the server's base URL and the request URL.
struct ReviewServer {
    base_url: String,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReviewServer {
    fn spawn(handler: Box<Handler>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start review server");
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(AtomicUsize::new(0));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let counter = requests.clone();
        let base = base_url.clone();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = handler(&base, request.url());
                let _ = request.respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn config(&self) -> ReviewSiteConfig {
        ReviewSiteConfig {
            search_url: format!("{}/search?q={{}}", self.base_url),
            subject_url: format!("{}/subject/{{}}/", self.base_url),
            reader_url: format!("{}/reader/", self.base_url),
            text_by: TextBy::FastHtml2Md,
            limit: 2,
            pages: 2,
            delay_ms: 0..=0,
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }
}

impl Drop for ReviewServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

const SEARCH_PAGE: &str = r#"<html><body>
<div class="result"><h3><span>[书籍]</span> <a href="https://www.douban.com/link2/?url=https%3A%2F%2Fbook.douban.com%2Fsubject%2F1%2F&amp;query=x">兄弟</a></h3></div>
<div class="result"><h3>No link here</h3></div>
</body></html>"#;

/// A site with one book whose two review index pages list reviews 111, 222 and 333.
fn review_site(failing_review: Option<&'static str>) -> ReviewServer {
    flaky_review_site(failing_review, None)
}

/// Like [`review_site`], with index page requests containing `failing_index` answering 500.
fn flaky_review_site(
    failing_review: Option<&'static str>,
    failing_index: Option<&'static str>,
) -> ReviewServer {
    ReviewServer::spawn(Box::new(move |_base, url| {
        if url.starts_with("/search") {
            return (200, SEARCH_PAGE.to_string());
        }
        if url.contains("/subject/1/reviews/") {
            if failing_index.is_some_and(|part| url.contains(part)) {
                return (500, "upstream error".to_string());
            }
            let body = if url.contains("start=20") {
                "[x](https://book.douban.com/review/222/) [y](https://book.douban.com/review/333/)"
            } else {
                "[a](https://book.douban.com/review/111/) [b](https://book.douban.com/review/222/)"
            };
            return (200, body.to_string());
        }
        if let Some(id) = url
            .strip_prefix("/reader/https://book.douban.com/review/")
            .and_then(|rest| rest.strip_suffix('/'))
        {
            if Some(id) == failing_review {
                return (500, "upstream error".to_string());
            }
            return (200, format!("Review {id} body"));
        }
        (404, "not found".to_string())
    }))
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("file is readable")
}

#[tokio::test]
async fn reviews_are_crawled_through_the_reader() {
    let server = review_site(None);
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");
    let site = ReviewSite::new(server.config()).expect("crawler");

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::Crawled(CrawlReport {
        fetched: 3,
        skipped: 0,
        failed: 0,
        index_failed: 0,
    }));
    let website_dir = book_dir.join(WEBSITE_DIR);
    assert_that(&read(&website_dir.join("111.txt"))).is_equal_to("Review 111 body".to_string());
    assert_that(&read(&website_dir.join("333.txt"))).is_equal_to("Review 333 body".to_string());

    let storage = Storage::open(&book_dir).expect("manifest");
    let ids: Vec<String> = storage
        .list_items()
        .expect("items")
        .into_iter()
        .map(|item| item.content_id)
        .collect();
    assert_that(&ids).is_equal_to(vec!["111".to_string(), "222".to_string(), "333".to_string()]);
    assert_that(&storage.crawl_completed_at(Source::Douban).expect("query").is_some()).is_true();
}

#[tokio::test]
async fn completed_crawl_is_not_repeated() {
    let server = review_site(None);
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");
    let site = ReviewSite::new(server.config()).expect("crawler");
    site.crawl_book(&book_dir, "兄弟").await.expect("first crawl");
    let requests = server.requests();

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("second crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::AlreadyExists);
    assert_that(&server.requests()).is_equal_to(requests);
}

#[tokio::test]
async fn interrupted_crawl_resumes() {
    let server = review_site(Some("333"));
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");
    let website_dir = book_dir.join(WEBSITE_DIR);
    std::fs::create_dir_all(&website_dir).expect("website dir");
    std::fs::write(website_dir.join("111.txt"), "fetched earlier").expect("write");
    let site = ReviewSite::new(server.config()).expect("crawler");

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::Crawled(CrawlReport {
        fetched: 1,
        skipped: 1,
        failed: 1,
        index_failed: 0,
    }));
    assert_that(&read(&website_dir.join("111.txt"))).is_equal_to("fetched earlier".to_string());
    assert_that(&website_dir.join("333.txt").exists()).is_false();

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("retry");

    assert_that(&outcome).is_equal_to(CrawlOutcome::Crawled(CrawlReport {
        fetched: 0,
        skipped: 2,
        failed: 1,
        index_failed: 0,
    }));
}

#[tokio::test]
async fn unreadable_review_index_is_retried() {
    let server = flaky_review_site(None, Some("reviews/"));
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");
    let site = ReviewSite::new(server.config()).expect("crawler");

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::Crawled(CrawlReport {
        fetched: 0,
        skipped: 0,
        failed: 0,
        index_failed: 1,
    }));
    let storage = Storage::open(&book_dir).expect("manifest");
    assert_that(&storage.crawl_completed_at(Source::Douban).expect("query").is_none()).is_true();
    let requests = server.requests();

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("retry");

    assert_that(&matches!(outcome, CrawlOutcome::Crawled(_))).is_true();
    assert_that(&(server.requests() > requests)).is_true();
}

#[tokio::test]
async fn failing_index_page_keeps_earlier_reviews() {
    let server = flaky_review_site(None, Some("start=20"));
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");
    let site = ReviewSite::new(server.config()).expect("crawler");

    let outcome = site.crawl_book(&book_dir, "兄弟").await.expect("crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::Crawled(CrawlReport {
        fetched: 2,
        skipped: 0,
        failed: 0,
        index_failed: 1,
    }));
    let website_dir = book_dir.join(WEBSITE_DIR);
    assert_that(&read(&website_dir.join("111.txt"))).is_equal_to("Review 111 body".to_string());
    assert_that(&read(&website_dir.join("222.txt"))).is_equal_to("Review 222 body".to_string());
    assert_that(&website_dir.join("333.txt").exists()).is_false();
    let storage = Storage::open(&book_dir).expect("manifest");
    assert_that(&storage.crawl_completed_at(Source::Douban).expect("query").is_none()).is_true();
}

#[tokio::test]
async fn unknown_book_writes_nothing() {
    let server = ReviewServer::spawn(Box::new(|_base, _url| {
        (200, "<html><body><p>No results</p></body></html>".to_string())
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("无此书");
    let site = ReviewSite::new(server.config()).expect("crawler");

    let outcome = site.crawl_book(&book_dir, "无此书").await.expect("crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::NotFound);
    assert_that(&book_dir.exists()).is_false();
}

#[tokio::test]
async fn failed_search_is_not_found() {
    let server = ReviewServer::spawn(Box::new(|_base, _url| (503, "busy".to_string())));
    let dir = tempfile::tempdir().expect("tempdir");
    let site = ReviewSite::new(server.config()).expect("crawler");

    let outcome = site.crawl_book(&dir.path().join("兄弟"), "兄弟").await.expect("crawl");

    assert_that(&outcome).is_equal_to(CrawlOutcome::NotFound);
}

#[tokio::test]
async fn review_text_is_extracted_locally_without_reader() {
    let server = ReviewServer::spawn(Box::new(|base, url| {
        if url.starts_with("/search") {
            return (200, SEARCH_PAGE.to_string());
        }
        if url.starts_with("/subject/1/reviews/") {
            return (200, format!(r#"<a href="{base}/review/444/">review</a>"#));
        }
        if url == "/review/444/" {
            return (
                200,
                "<html><head><title>Review 444</title></head><body><p>A long and careful review.</p></body></html>"
                    .to_string(),
            );
        }
        (404, "not found".to_string())
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");
    let mut config = server.config();
    config.reader_url = String::new();
    config.pages = 1;
    config.review_pattern = format!(r"{}/review/\d+/", regex::escape(&server.base_url));
    let site = ReviewSite::new(config).expect("crawler");

    site.crawl_book(&book_dir, "兄弟").await.expect("crawl");

    let text = read(&book_dir.join(WEBSITE_DIR).join("444.txt"));
    assert_that(&text).contains("Review 444");
    assert_that(&text).contains("A long and careful review.");
}
