use deepread::Source;
use deepread::constants::MANIFEST_FILE;
use deepread::storage::{ContentItem, Storage};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;

#[test]
fn manifest_is_only_opened_when_present() {
    let dir = tempfile::tempdir().expect("tempdir");
    let book_dir = dir.path().join("兄弟");

    assert_that(&Storage::open_existing(&book_dir).expect("no error").is_none()).is_true();
    assert_that(&book_dir.exists()).is_false();

    Storage::open(&book_dir).expect("manifest");

    assert_that(&book_dir.join(MANIFEST_FILE).exists()).is_true();
    assert_that(&Storage::open_existing(&book_dir).expect("no error").is_some()).is_true();
}

#[test]
fn items_keep_provenance_and_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::open(dir.path()).expect("manifest");
    let raw_path = dir.path().join("video").join("bilibili_BV1.txt");
    storage
        .record_item(&ContentItem::new(
            Source::Bilibili,
            "https://www.bilibili.com/video/BV1",
            "bilibili_BV1",
            raw_path.clone(),
        ))
        .expect("recorded");

    assert_that(&storage.has_item(Source::Bilibili, "bilibili_BV1").expect("query")).is_true();
    assert_that(&storage.has_item(Source::YouTube, "bilibili_BV1").expect("query")).is_false();

    let items = Storage::open(dir.path()).expect("reopen").list_items().expect("items");
    assert_that(&items.len()).is_equal_to(1);
    assert_that(&items[0].source).is_equal_to(Source::Bilibili);
    assert_that(&items[0].raw_path).is_equal_to(raw_path);
}

#[test]
fn crawl_completion_is_per_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::open(dir.path()).expect("manifest");

    storage.mark_crawl_complete(Source::Douban).expect("marked");

    assert_that(&storage.crawl_completed_at(Source::Douban).expect("query").is_some()).is_true();
    assert_that(&storage.crawl_completed_at(Source::YouTube).expect("query").is_none()).is_true();
}
