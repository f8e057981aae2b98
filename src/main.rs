//! deepread is a CLI tool that gathers reviews of a book from the review website
//! and from videos, and turns them into a long-form review with an LLM.
//!
//! The stages can be run one by one or all together:
//! 1. `crawl` / `videos` - Fetch raw reviews and video transcripts
//! 2. `clean` - Clean the raw texts
//! 3. `classify` - Split cleaned texts into plot, feeling, evaluation and reflection
//! 4. `report` - Synthesize the review document
//! 5. `run` - All of the above, asking before each stage unless `--auto` is given
//! 6. `chat` - Talk about the book with a persona seeded with the review

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use llm::LLMProvider;
use log::{LevelFilter, info, warn};

use deepread::{
    TextBy, VideoInput,
    classify::classify_book,
    clean::{clean_video_dir, clean_website_dir},
    constants::{MODEL_API_KEY_ENV_NAME, READER_URL_ENV_NAME, REPORT_FILE, VIDEO_DIR, WEBSITE_DIR},
    model::{DEFAULT_TIMEOUT, ModelContext, model_builder, rate_limiter},
    persona::{Conversation, Persona},
    pipeline::{PipelineConfig, crawl_videos, crawl_website, run},
    report::generate_report,
};

/// A CLI tool to turn book reviews and review videos into a long-form review
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute
    #[command(subcommand)]
    command: Command,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", global = true, default_value_t = 2)]
    verbose: u8,

    /// Rate limit of model calls: requests per minute (default: no limit)
    #[arg(long, short = 'r', global = true)]
    rpm: Option<u32>,

    /// How many times a failed model call is retried
    #[arg(long, global = true, default_value_t = deepread::model::DEFAULT_RETRIES)]
    retries: u32,
}

#[derive(Args, Clone)]
struct SiteArgs {
    /// Number of search results crawled for reviews
    #[arg(long, default_value_t = 2)]
    reviews: usize,
    /// Number of review index pages read per search result
    #[arg(long, default_value_t = 5)]
    pages: u32,
    /// Text extraction method when no reader proxy is set: "dom_smoothie" (default) or "fast_html2md"
    #[arg(long, default_value = "dom_smoothie")]
    text_by: TextBy,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole pipeline for a book
    Run {
        /// The book title
        book: String,
        /// URL of the LLM model, e.g. openai://gpt-4o-mini
        #[arg(long, short)]
        model: String,
        /// Path to a file with video URLs, or "auto" to search for videos
        #[arg(long, default_value = "video_link.txt")]
        video: VideoInput,
        /// Run every stage without asking for confirmation
        #[arg(long)]
        auto: bool,
        #[command(flatten)]
        site: SiteArgs,
    },
    /// Crawl reviews of a book from the review website
    Crawl {
        /// The book title
        book: String,
        #[command(flatten)]
        site: SiteArgs,
    },
    /// Download and transcribe review videos of a book
    Videos {
        /// The book title
        book: String,
        /// Path to a file with video URLs, or "auto" to search for videos
        #[arg(default_value = "video_link.txt")]
        video: VideoInput,
        /// Number of searched videos downloaded in auto mode
        #[arg(long, default_value_t = 3)]
        max_videos: usize,
    },
    /// Clean raw reviews and, when a model is given, video transcripts
    Clean {
        /// The book title
        book: String,
        /// URL of the LLM model used to correct transcripts
        #[arg(long, short)]
        model: Option<String>,
    },
    /// Classify cleaned texts into plot, feeling, evaluation and reflection
    Classify {
        /// The book title
        book: String,
        /// URL of the LLM model
        #[arg(long, short)]
        model: String,
    },
    /// Synthesize the review document from the classified texts
    Report {
        /// The book title
        book: String,
        /// URL of the LLM model
        #[arg(long, short)]
        model: String,
    },
    /// Talk about a book with a persona seeded with its review
    Chat {
        /// The book title
        book: String,
        /// URL of the LLM model
        #[arg(long, short)]
        model: String,
        /// "critic" (default), "enthusiast" or "thinker"
        #[arg(long, short, default_value = "critic")]
        persona: Persona,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    match cli.command {
        Command::Run {
            book,
            model,
            video,
            auto,
            site,
        } => {
            let mut config = pipeline_config(&book, &site);
            config.video_input = video;
            config.auto = auto;
            let model = build_model(&model)?;
            let limiter = rate_limiter(cli.rpm);
            let ctx = model_context(model.as_ref(), limiter.as_ref(), cli.retries);
            run(&config, &ctx).await
        }
        Command::Crawl { book, site } => {
            let outcome = crawl_website(&pipeline_config(&book, &site)).await?;
            info!("Crawl of {book} finished: {outcome:?}");
            Ok(())
        }
        Command::Videos {
            book,
            video,
            max_videos,
        } => {
            let mut config = PipelineConfig::new(&book);
            config.video_input = video;
            config.max_videos = max_videos;
            crawl_videos(&config).await.map(|_| ())
        }
        Command::Clean { book, model } => {
            let book_dir = PathBuf::from(&book);
            clean_website_dir(&book_dir.join(WEBSITE_DIR))?;
            match model {
                Some(model) => {
                    let model = build_model(&model)?;
                    let limiter = rate_limiter(cli.rpm);
                    let ctx = model_context(model.as_ref(), limiter.as_ref(), cli.retries);
                    clean_video_dir(&ctx, &book_dir.join(VIDEO_DIR)).await?;
                }
                None => warn!("No model given, video transcripts are not cleaned"),
            }
            Ok(())
        }
        Command::Classify { book, model } => {
            let model = build_model(&model)?;
            let limiter = rate_limiter(cli.rpm);
            let ctx = model_context(model.as_ref(), limiter.as_ref(), cli.retries);
            classify_book(&ctx, &PathBuf::from(&book)).await.map(|_| ())
        }
        Command::Report { book, model } => {
            let model = build_model(&model)?;
            let limiter = rate_limiter(cli.rpm);
            let ctx = model_context(model.as_ref(), limiter.as_ref(), cli.retries);
            generate_report(&ctx, &PathBuf::from(&book), &book)
                .await
                .map(|_| ())
        }
        Command::Chat {
            book,
            model,
            persona,
        } => {
            let model = build_model(&model)?;
            let limiter = rate_limiter(cli.rpm);
            let ctx = model_context(model.as_ref(), limiter.as_ref(), cli.retries);
            handle_chat_command(&ctx, &book, persona).await
        }
    }
}

fn pipeline_config(book: &str, site: &SiteArgs) -> PipelineConfig {
    let mut config = PipelineConfig::new(book);
    config.site.limit = site.reviews;
    config.site.pages = site.pages;
    config.site.text_by = site.text_by;
    match std::env::var(READER_URL_ENV_NAME) {
        Ok(reader_url) => {
            info!("Fetching reviews through reader proxy {reader_url}");
            config.site.reader_url = reader_url;
        }
        Err(_) => info!("{READER_URL_ENV_NAME} is not set, extracting review text locally"),
    }
    config
}

fn build_model(model: &str) -> Result<Box<dyn LLMProvider>> {
    let api_key = match std::env::var(MODEL_API_KEY_ENV_NAME) {
        Ok(model_key) => {
            info!("API KEY is provided");
            Some(model_key)
        }
        Err(err) => {
            info!("{err} while providing api key");
            None
        }
    };

    model_builder(model, api_key)?
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))
}

fn model_context<'a>(
    model: &'a dyn LLMProvider,
    rate_limiter: Option<&'a rate_guard::StdTokenBucket>,
    retries: u32,
) -> ModelContext<'a> {
    ModelContext {
        model,
        rate_limiter,
        retries,
        timeout: DEFAULT_TIMEOUT,
    }
}

async fn handle_chat_command(ctx: &ModelContext<'_>, book: &str, persona: Persona) -> Result<()> {
    let report_path = PathBuf::from(book).join(REPORT_FILE);
    let seed = std::fs::read_to_string(&report_path).with_context(|| {
        format!(
            "Failed to read {}, generate the report first",
            report_path.display()
        )
    })?;

    let mut conversation = Conversation::new(book, &seed, persona);
    println!(
        "Talking about {book} with {}. Type 'exit' or press Ctrl-D to leave.",
        persona.name()
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        match conversation.reply(ctx, line).await {
            Ok(answer) => println!("{}: {answer}\n", persona.name()),
            Err(err) => warn!("{err:#}"),
        }
    }

    Ok(())
}
