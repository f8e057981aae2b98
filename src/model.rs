//! The model module wraps the language model used by the cleaner, the classifier,
//! the report synthesizer and the persona chat.

use anyhow::{Context, Result};
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatProvider};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;
use url::Url;

use crate::constants::THINK_STRIPPER;

use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use std::time::Duration;

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));
static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("Failed to compile PLACEHOLDER regex"));

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Configuration containing shared data for every model call of one pipeline run
pub struct ModelContext<'a> {
    /// LLM model to send prompts to
    pub model: &'a dyn ChatProvider,
    /// Rate limiter for controlling request frequency
    pub rate_limiter: Option<&'a StdTokenBucket>,
    /// How many times a failed call is retried before the error is returned
    pub retries: u32,
    /// Upper bound for a single call
    pub timeout: Duration,
}

impl<'a> ModelContext<'a> {
    /// Creates a context with default retry and timeout settings and no rate limit.
    pub fn new(model: &'a dyn ChatProvider) -> Self {
        Self {
            model,
            rate_limiter: None,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Creates an LLM builder from a model URL such as `openai://gpt-4o-mini`.
///
/// The scheme selects the backend, the host (and optional user part for tags
/// like `ollama://qwen2.5:32b@`) selects the model name.
///
/// # Errors
///
/// Returns an error if the URL is invalid, names an unknown backend or has no host.
pub fn model_builder(model: &str, api_key: Option<String>) -> Result<LLMBuilder> {
    let model_url = Url::parse(model).map_err(|e| anyhow::anyhow!("Invalid model URL: {}", e))?;
    let llm_builder = LLMBuilder::new()
        .backend(
            LLMBackend::from_str(model_url.scheme())
                .map_err(|e| anyhow::anyhow!("Invalid LLM backend: {}", e))?,
        )
        .model(
            [
                model_url
                    .host_str()
                    .context("Specify model name as host URL.")?,
                model_url.username(),
            ]
            .iter()
            .filter(|x| !x.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(":"),
        );

    Ok(match api_key {
        Some(api_key) => llm_builder.api_key(api_key),
        None => llm_builder,
    })
}

/// Builds a token bucket allowing `rpm` model requests per minute.
pub fn rate_limiter(rpm: Option<u32>) -> Option<StdTokenBucket> {
    rpm.and_then(|rpm| {
        let capacity = rpm.max(1) as u64;
        let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

        TokenBucketBuilder::builder()
            .capacity(capacity)
            .refill_amount(1_u64)
            .refill_every(refill_interval)
            .with_time(rate_guard::StdTimeSource::new())
            .with_precision::<rate_guard::Nanos>()
            .build()
            .ok()
    })
}

/// Sends a single user prompt and returns the model's answer.
///
/// # Errors
///
/// Returns an error if every attempt fails or times out.
pub async fn complete_prompt(ctx: &ModelContext<'_>, prompt: &str) -> Result<String> {
    complete(ctx, &[ChatMessage::user().content(prompt).build()]).await
}

/// Sends a conversation to the model, retrying with exponential backoff.
///
/// Reasoning blocks (`<think>...</think>`) are removed and the answer is trimmed.
///
/// # Errors
///
/// Returns an error if every attempt fails or times out.
pub async fn complete(ctx: &ModelContext<'_>, messages: &[ChatMessage]) -> Result<String> {
    let mut attempt = 0;
    loop {
        match chat_once(ctx, messages).await {
            Ok(response) => return Ok(response),
            Err(err) if attempt < ctx.retries => {
                let delay = RETRY_BASE_DELAY * 2_u32.pow(attempt);
                warn!("Model call failed ({err}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn chat_once(ctx: &ModelContext<'_>, messages: &[ChatMessage]) -> Result<String> {
    if let Some(limiter) = ctx.rate_limiter {
        loop {
            match limiter.try_acquire(1) {
                Ok(()) => break,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    let response = tokio::time::timeout(ctx.timeout, ctx.model.chat(messages))
        .await
        .map_err(|_| anyhow::anyhow!("LLM call timed out after {:?}", ctx.timeout))?
        .map_err(|err| anyhow::anyhow!("LLM error: {err}."))?
        .to_string();

    debug!("Model answered with {} bytes", response.len());

    Ok(strip_thinking(&response))
}

/// Removes reasoning blocks some models prepend to their answer.
pub fn strip_thinking(response: &str) -> String {
    THINK_STRIPPER_REGEX
        .replace_all(response, "")
        .to_string()
        .trim()
        .to_owned()
}

/// Fills the `{name}` placeholders of a prompt template in a single pass.
///
/// Inserted values are never scanned again, so model output or user text that
/// contains braces is kept verbatim. Placeholders without a value are left as is.
pub fn fill_prompt(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &regex::Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}
