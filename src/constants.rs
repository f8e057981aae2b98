pub const MODEL_API_KEY_ENV_NAME: &str = "DEEPREAD_MODEL_API_KEY";
pub const READER_URL_ENV_NAME: &str = "DEEPREAD_READER_URL";

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const DEFAULT_SEARCH_URL: &str = "https://www.douban.com/search?q={}&cat=1001";
pub const DEFAULT_SUBJECT_URL: &str = "https://book.douban.com/subject/{}/";
pub const DEFAULT_REVIEW_PATTERN: &str = r"https://book\.douban\.com/review/\d+/";
pub const REVIEWS_PAGE_SIZE: u32 = 20;

pub const BILIBILI_SEARCH_URL: &str = "https://api.bilibili.com/x/web-interface/search/type";
pub const BILIBILI_REFERER: &str = "https://www.bilibili.com/";

/// Present on every real review page rendered by the reader proxy.
pub const DOWNLOAD_APP_MARKER: &str = "下载豆瓣客户端";
pub const SPOILER_MARKER: &str = "有关键情节透露";
pub const PAGE_TAGLINE: &str =
    "[](https://book.douban.com/annual/2024/?fullscreen=1&&dt_from=book_navigation)";

pub const RAW_EXTENSION: &str = "txt";
pub const CLEANED_SUFFIX: &str = "_cleaned.txt";

pub const WEBSITE_DIR: &str = "website";
pub const VIDEO_DIR: &str = "video";
pub const MANIFEST_FILE: &str = "manifest.sqlite";
pub const DATASET_CSV_FILE: &str = "parsed_data.csv";
pub const DATASET_JSON_FILE: &str = "parsed_data.json";
pub const VIDEO_LINKS_FILE: &str = "video_links.txt";
pub const REPORT_FILE: &str = "report.md";
pub const REPORT_PROMPT_FILE: &str = "report_prompt.md";

/// Written by the classifier when a category has no matching sentences.
pub const NOT_PRESENT: &str = "Not present.";

pub(crate) const VIDEO_CLEAN_PROMPT: &str = r#"Act as a spelling corrector and improver. (replyWithRewrittenText)

Strictly follow these rules:
- Correct spelling, grammar and punctuation
- (maintainOriginalLanguage)
- NEVER surround the rewritten text with quotes
- (maintainURLs)
- Don't change emojis
- Split the text into paragraphs

Text: {text}

Fixed Text:
"#;

pub(crate) const PLOT_PROMPT: &str = r#"Find the parts of this book review that describe the book's plot. Strictly follow these rules:
- Output every sentence related to the plot
- Copy the sentences exactly as they appear in the review, do not change them
- If the review contains no such sentences, output exactly: Not present.

Review:
{review}

Plot:
"#;

pub(crate) const FEELING_PROMPT: &str = r#"Find the parts of this book review that describe how the reviewer felt while reading. Strictly follow these rules:
- Output every sentence related to the reading experience and feelings
- Copy the sentences exactly as they appear in the review, do not change them
- If the review contains no such sentences, output exactly: Not present.

Review:
{review}

Feelings:
"#;

pub(crate) const EVALUATION_PROMPT: &str = r#"Find the parts of this book review that evaluate the book. Strictly follow these rules:
- Output every sentence that judges the book's strengths or weaknesses
- Copy the sentences exactly as they appear in the review, do not change them
- If the review contains no such sentences, output exactly: Not present.

Review:
{review}

Evaluation:
"#;

pub(crate) const REFLECTION_PROMPT: &str = r#"Find the parts of this book review that contain the reviewer's own reflections. Strictly follow these rules:
- Output every sentence of reflection
- Sentences unrelated to the book's content count as reflection
- Sentences about the author's life also count as reflection
- Copy the sentences exactly as they appear in the review, do not change them
- If the review contains no such sentences, output exactly: Not present.

Review:
{review}

Reflection:
"#;

pub(crate) const PLOT_SECTION_PROMPT: &str = r#"You are a book review expert. We are discussing the book {book}. Below are readers' descriptions of its plot.
Based on them, describe the plot of this book in 1000-2000 words.

"#;

pub(crate) const FEELING_SECTION_PROMPT: &str = r#"You are a book review expert. We are discussing the book {book}. Below are readers' feelings about it.

"#;

pub(crate) const EVALUATION_SECTION_PROMPT: &str = r#"You are a book review expert. We are discussing the book {book}. Below are readers' evaluations of it.

"#;

pub(crate) const REFLECTION_SECTION_PROMPT: &str = r#"You are a book review expert. We are discussing the book {book}. Below are readers' reflections on it.

"#;

pub(crate) const PLOT_CONTEXT_PROMPT: &str = "Today we discuss {book}. This book's plot is: {plot}\n\n";

pub(crate) const FEELING_SECTION_TASK: &str =
    "Based on these descriptions, write 2000-3000 words about how reading this book felt.";
pub(crate) const EVALUATION_SECTION_TASK: &str = "Based on these descriptions, write 2000-3000 words evaluating this book. Discuss its strengths and its weaknesses separately.";
pub(crate) const REFLECTION_SECTION_TASK: &str = "Based on these descriptions, write 3000-5000 words about your reflections after reading this book. You may extend and elevate its themes.";

pub(crate) const REPORT_PROMPT: &str = r#"Write an in-depth review of a book. It must fully include all of the content below.
The book is {book}.

# Plot
{plot}

# Feelings
{feeling}

# Evaluation
{evaluation}

# Reflection
{reflection}

Output markdown and strictly follow these rules:
- Do not include anything other than the markdown document.
- Aim for about 8000 words.
- Never write "reader X thinks"; write the review in the first person.
"#;

pub(crate) const PERSONA_PROMPT: &str = r#"We are discussing the book {book}. Here is an in-depth review of it:

{seed}

You are {name}, a reader who {style}
Stay in character, answer in the language the user writes in, and keep each reply under 300 words."#;
