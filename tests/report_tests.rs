use crate::model_extras::{StubLlmProvider, context};
use deepread::Source;
use deepread::classify::Category;
use deepread::constants::{NOT_PRESENT, REPORT_FILE, REPORT_PROMPT_FILE};
use deepread::dataset::{ReviewRecord, write_dataset};
use deepread::report::category_prompt;
use deepread::{generate_report, synthesize};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;
use spectral::string::StrAssertions;

mod model_extras;

fn record(plot: &str, feeling: &str) -> ReviewRecord {
    ReviewRecord {
        source: Source::Douban,
        source_url: "https://book.douban.com/review/1/".to_string(),
        plot_text: plot.to_string(),
        feeling_text: feeling.to_string(),
        evaluation_text: "Well written.".to_string(),
        reflection_text: NOT_PRESENT.to_string(),
    }
}

/// Answers the plot section with a fixed plot and every other prompt with its own length.
fn section_stub() -> StubLlmProvider {
    StubLlmProvider::with(|prompt| {
        if prompt.contains("describe the plot of this book") {
            Ok("THE SYNTHESIZED PLOT".to_string())
        } else {
            Ok(format!("section of {} bytes", prompt.len()))
        }
    })
}

#[test]
fn records_are_labelled_in_order() {
    let records = [record("a", "x"), record("b", "y"), record("c", "z")];

    let prompt = category_prompt("兄弟", Category::Plot, &records, None);

    let first = prompt.find("#1 plot: a").expect("first record");
    let second = prompt.find("#2 plot: b").expect("second record");
    let third = prompt.find("#3 plot: c").expect("third record");
    assert_that(&(first < second && second < third)).is_true();
    assert_that(&prompt).contains("兄弟");
}

#[test]
fn sentinel_texts_are_left_out_without_renumbering() {
    let records = [record("a", NOT_PRESENT), record("b", "moved")];

    let prompt = category_prompt("兄弟", Category::Feeling, &records, Some("plot summary"));

    assert_that(&prompt).does_not_contain("#1 feeling");
    assert_that(&prompt).contains("#2 feeling: moved");
    assert_that(&prompt).starts_with("Today we discuss 兄弟. This book's plot is: plot summary");
}

#[tokio::test]
async fn plot_is_given_to_the_other_sections() {
    let stub = section_stub();
    let ctx = context(&stub);
    let records = [record("Two brothers.", "Sad.")];

    let review = synthesize(&ctx, "兄弟", &records).await.expect("synthesis");

    assert_that(&review.plot).is_equal_to("THE SYNTHESIZED PLOT".to_string());
    let prompts = stub.prompts();
    assert_that(&prompts.len()).is_equal_to(5);
    assert_that(&prompts[0]).does_not_contain("THE SYNTHESIZED PLOT");
    for section_prompt in prompts.iter().skip(1).take(3) {
        assert_that(section_prompt).contains("THE SYNTHESIZED PLOT");
    }
    assert_that(&review.prompt).contains(review.feeling.as_str());
    assert_that(&review.prompt).contains(review.evaluation.as_str());
    assert_that(&review.prompt).contains(review.reflection.as_str());
}

#[tokio::test]
async fn sections_with_braces_are_composed_verbatim() {
    let stub = StubLlmProvider::with(|prompt| {
        if prompt.contains("describe the plot of this book") {
            Ok("A plot mentioning {feeling} and {book}".to_string())
        } else {
            Ok("section".to_string())
        }
    });
    let ctx = context(&stub);
    let records = [record("Two brothers.", "Sad.")];

    let review = synthesize(&ctx, "兄弟", &records).await.expect("synthesis");

    assert_that(&review.prompt).contains("A plot mentioning {feeling} and {book}");
    assert_that(&stub.prompts()[1]).contains("A plot mentioning {feeling} and {book}");
}

#[tokio::test]
async fn report_files_are_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_dataset(dir.path(), &[record("Two brothers.", "Sad.")]).expect("dataset");
    let stub = section_stub();
    let ctx = context(&stub);

    let review = generate_report(&ctx, dir.path(), "兄弟").await.expect("report");

    assert_that(&std::fs::read_to_string(dir.path().join(REPORT_FILE)).expect("report"))
        .is_equal_to(review.document);
    assert_that(&std::fs::read_to_string(dir.path().join(REPORT_PROMPT_FILE)).expect("prompt"))
        .is_equal_to(review.prompt);
}

#[tokio::test]
async fn empty_dataset_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_dataset(dir.path(), &[]).expect("dataset");
    let stub = section_stub();
    let ctx = context(&stub);

    assert_that(&generate_report(&ctx, dir.path(), "兄弟").await.is_err()).is_true();
    assert_that(&stub.calls()).is_equal_to(0);
    assert_that(&dir.path().join(REPORT_FILE).exists()).is_false();
}

#[tokio::test]
async fn failing_section_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_dataset(dir.path(), &[record("Two brothers.", "Sad.")]).expect("dataset");
    let stub = StubLlmProvider::failing("overloaded");
    let ctx = context(&stub);

    assert_that(&generate_report(&ctx, dir.path(), "兄弟").await.is_err()).is_true();
    assert_that(&dir.path().join(REPORT_FILE).exists()).is_false();
}
