//! LLM interaction: build extraction messages and call the provider.
//!
//! This module turns crawled Markdown into an LLM API call and returns
//! normalized items. It is intentionally thin — all prompt engineering
//! lives in [`crate::prompts`] so it can be changed without touching retry
//! or error-handling logic here.
//!
//! The provider is reached through the [`ChatBackend`] seam: the production
//! implementation wraps the `edgequake-llm` provider handle, while tests
//! script replies to drive the retry and fallback paths without network I/O.
//!
//! ## Retry Strategy
//!
//! Transient API errors and unparseable replies are retried the same way:
//! exponential backoff starting at `retry_backoff_ms`, doubling per attempt
//! with the multiplier capped. A reply with no recoverable JSON is worth a
//! re-roll — at temperature 0.1 the second attempt almost always complies.
//! Hard provider errors surface as [`ExtractError::LlmFailed`] once the
//! budget is spent.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::ExtractedItem;
use crate::pipeline::parse;
use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// The one provider capability this stage consumes: a single chat turn.
///
/// `Err` carries a displayable reason; the retry loop treats every error as
/// transient.
pub trait ChatBackend: Send + Sync {
    fn chat_text(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> impl Future<Output = Result<ChatReply, String>> + Send;
}

/// A completed chat turn, reduced to what the retry loop consumes.
#[derive(Debug)]
pub struct ChatReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl<'p> ChatBackend for Arc<dyn LLMProvider + 'p> {
    async fn chat_text(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChatReply, String> {
        let response = self
            .chat(messages, Some(options))
            .await
            .map_err(|e| e.to_string())?;
        Ok(ChatReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// Result of one successful LLM extraction.
#[derive(Debug)]
pub struct LlmExtraction {
    pub items: Vec<ExtractedItem>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Extract text/image items from Markdown via the LLM backend.
///
/// The Markdown is truncated to `config.max_markdown_chars` before it is
/// embedded in the prompt; the caller keeps the full document for the
/// heuristic fallback.
pub async fn extract_items<B: ChatBackend>(
    backend: &B,
    markdown: &str,
    config: &ExtractionConfig,
) -> Result<LlmExtraction, ExtractError> {
    let start = Instant::now();
    let truncated = truncate_chars(markdown, config.max_markdown_chars);

    let messages = vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::user(extraction_prompt(truncated)),
    ];

    debug!(
        "LLM extraction: {} markdown chars (~{} tokens estimated)",
        truncated.chars().count(),
        estimate_tokens(truncated)
    );

    let options = build_options(config);
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "LLM extraction: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let reply = match backend.chat_text(&messages, &options).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("LLM extraction: attempt {} failed — {}", attempt + 1, e);
                last_err = Some(e);
                continue;
            }
        };

        match parse::recover_json(&reply.content) {
            Ok(value) => {
                let items = parse::normalize_items(&value, config.min_text_chars);
                let duration = start.elapsed();
                info!(
                    "LLM extraction: {} items, {} in / {} out tokens, {:?}",
                    items.len(),
                    reply.prompt_tokens,
                    reply.completion_tokens,
                    duration
                );
                return Ok(LlmExtraction {
                    items,
                    input_tokens: reply.prompt_tokens,
                    output_tokens: reply.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) => {
                warn!("LLM extraction: attempt {} unparseable — {}", attempt + 1, e);
                last_err = Some(e.to_string());
            }
        }
    }

    Err(ExtractError::LlmFailed {
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Backoff before retry `attempt` (1-based): doubles per attempt, with the
/// multiplier capped at 2^10 so a large retry count can neither overflow
/// nor stall the pipeline for hours.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(1u64 << (attempt - 1).min(10))
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Rough token estimate for pre-flight logging.
///
/// CJK characters tokenize to roughly two tokens each; everything else
/// averages about four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let other = text.chars().count() - cjk;
    cjk * 2 + other / 4
}

/// Scripted [`ChatBackend`] for exercising retry and fallback paths.
///
/// Replies are served in order; once exhausted every call fails.
#[cfg(test)]
pub(crate) struct ScriptedChat {
    replies: std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>,
    calls: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl ScriptedChat {
    pub(crate) fn new(replies: &[Result<&str, &str>]) -> Self {
        Self {
            replies: std::sync::Mutex::new(
                replies
                    .iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ChatBackend for ScriptedChat {
    async fn chat_text(
        &self,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<ChatReply, String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(ChatReply {
                content,
                prompt_tokens: 120,
                completion_tokens: 40,
            }),
            Some(Err(reason)) => Err(reason),
            None => Err("backend unavailable".to_string()),
        }
    }
}
