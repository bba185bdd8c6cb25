//! Crawl-and-extract entry points.
//!
//! The full pipeline is `extract`: submit the URL, wait for Markdown,
//! run one (or both) extraction paths, normalize, and return items with
//! statistics. [`extract_from_markdown`] starts at stage three for callers
//! that already hold Markdown — it is also what keeps the extraction logic
//! testable without a crawler.

use crate::config::{ExtractionConfig, ExtractionMode};
use crate::error::ExtractError;
use crate::output::{ExtractOutput, ExtractStats, ExtractedItem, ExtractionSource};
use crate::pipeline::{crawl, heuristic, llm, poll};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without an explicit model.
///
/// The default of the service this crate replaces.
const DEFAULT_MODEL: &str = "moonshot-v1-8k";

/// Crawl a URL and extract paired text/image items.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `url` — Target page URL, handed to the external crawler
/// * `config` — Pipeline configuration
///
/// # Errors
/// * [`ExtractError::CrawlInProgress`] — the crawl did not finish within
///   the polling budget; callers may retry later (HTTP surface: 202)
/// * Crawl/LLM/content variants for the respective failures
pub async fn extract(
    url: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractOutput, ExtractError> {
    let total_start = Instant::now();
    let url = url.as_ref();
    info!("Starting extraction for {}", url);

    // ── Step 1: Submit the crawl ─────────────────────────────────────────
    let crawl_start = Instant::now();
    let client = crawl::CrawlerClient::new(config)?;
    let job = client.start_crawl(url, config.crawl_limit).await?;

    // ── Step 2: Wait for Markdown ────────────────────────────────────────
    let polled = poll::wait_for_content(&client, &job, config).await?;
    let crawl_duration_ms = crawl_start.elapsed().as_millis() as u64;
    info!(
        "Markdown ready: {} chars after {} poll attempts ({}ms)",
        polled.markdown.chars().count(),
        polled.attempts,
        crawl_duration_ms
    );

    // ── Steps 3–4: Extract and normalize ─────────────────────────────────
    let (items, source, llm_stats) = run_extraction(&polled.markdown, config).await?;

    Ok(ExtractOutput {
        items,
        source,
        stats: ExtractStats {
            poll_attempts: polled.attempts,
            used_partial_content: polled.used_partial,
            markdown_chars: polled.markdown.chars().count(),
            input_tokens: llm_stats.input_tokens,
            output_tokens: llm_stats.output_tokens,
            crawl_duration_ms,
            llm_duration_ms: llm_stats.duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        },
    })
}

/// Extract items from Markdown that is already in hand (skips crawl/poll).
pub async fn extract_from_markdown(
    markdown: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractOutput, ExtractError> {
    let total_start = Instant::now();
    let markdown = markdown.as_ref();
    if markdown.trim().is_empty() {
        return Err(ExtractError::MarkdownEmpty);
    }

    let (items, source, llm_stats) = run_extraction(markdown, config).await?;

    Ok(ExtractOutput {
        items,
        source,
        stats: ExtractStats {
            poll_attempts: 0,
            used_partial_content: false,
            markdown_chars: markdown.chars().count(),
            input_tokens: llm_stats.input_tokens,
            output_tokens: llm_stats.output_tokens,
            crawl_duration_ms: 0,
            llm_duration_ms: llm_stats.duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        },
    })
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    url: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(url, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Zeroed LLM statistics for the heuristic-only outcome.
#[derive(Debug, Default)]
struct LlmStats {
    input_tokens: usize,
    output_tokens: usize,
    duration_ms: u64,
}

impl From<&llm::LlmExtraction> for LlmStats {
    fn from(e: &llm::LlmExtraction) -> Self {
        Self {
            input_tokens: e.input_tokens,
            output_tokens: e.output_tokens,
            duration_ms: e.duration_ms,
        }
    }
}

/// Resolve the provider, then run the configured extraction path(s).
async fn run_extraction(
    markdown: &str,
    config: &ExtractionConfig,
) -> Result<(Vec<ExtractedItem>, ExtractionSource, LlmStats), ExtractError> {
    let provider = resolve_provider(config)?;
    extract_with(markdown, config, provider.as_ref()).await
}

/// Mode dispatch over an already-resolved chat backend.
///
/// Generic over [`llm::ChatBackend`] so the branch logic is testable with a
/// scripted backend.
async fn extract_with<B: llm::ChatBackend>(
    markdown: &str,
    config: &ExtractionConfig,
    backend: Option<&B>,
) -> Result<(Vec<ExtractedItem>, ExtractionSource, LlmStats), ExtractError> {
    let (items, source, stats) = match (config.mode, backend) {
        (ExtractionMode::HeuristicOnly, _) | (_, None) => {
            let items = heuristic::extract_pairs(markdown, config.min_text_chars);
            (items, ExtractionSource::Heuristic, LlmStats::default())
        }

        (ExtractionMode::HeuristicFirst, Some(backend)) => {
            let direct = heuristic::extract_pairs(markdown, config.min_text_chars);
            if direct.len() >= config.min_heuristic_items {
                (direct, ExtractionSource::Heuristic, LlmStats::default())
            } else {
                debug!(
                    "Heuristic found only {} items (< {}); consulting LLM",
                    direct.len(),
                    config.min_heuristic_items
                );
                match llm::extract_items(backend, markdown, config).await {
                    Ok(extraction) if !extraction.items.is_empty() => {
                        let stats = LlmStats::from(&extraction);
                        (extraction.items, ExtractionSource::Llm, stats)
                    }
                    Ok(_) => {
                        warn!("LLM returned no items; keeping heuristic result");
                        (direct, ExtractionSource::Heuristic, LlmStats::default())
                    }
                    Err(e) => {
                        warn!("LLM extraction failed ({}); keeping heuristic result", e);
                        (direct, ExtractionSource::Heuristic, LlmStats::default())
                    }
                }
            }
        }

        (ExtractionMode::LlmFirst, Some(backend)) => {
            match llm::extract_items(backend, markdown, config).await {
                Ok(extraction) if !extraction.items.is_empty() => {
                    let stats = LlmStats::from(&extraction);
                    (extraction.items, ExtractionSource::Llm, stats)
                }
                Ok(_) => {
                    warn!("LLM returned no items; falling back to heuristic");
                    let items = heuristic::extract_pairs(markdown, config.min_text_chars);
                    (items, ExtractionSource::Heuristic, LlmStats::default())
                }
                Err(e) => {
                    warn!("LLM extraction failed ({}); falling back to heuristic", e);
                    let items = heuristic::extract_pairs(markdown, config.min_text_chars);
                    (items, ExtractionSource::Heuristic, LlmStats::default())
                }
            }
        }
    };

    if items.is_empty() {
        return Err(ExtractError::NoContent);
    }

    Ok((items, source, stats))
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured the provider entirely; used as-is. Useful in tests.
/// 2. **Named provider** (`config.provider_name`) — reads the matching API
///    key from the environment; a failure here is loud, because the caller
///    asked for this provider by name.
/// 3. **Environment auto-detection** — the factory scans known API key
///    variables. Failure is quiet: the pipeline degrades to the heuristic
///    path, which is the correct behaviour for LLM-less deployments.
///
/// `Ok(None)` means "run without an LLM" and is returned immediately for
/// [`ExtractionMode::HeuristicOnly`].
fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Option<Arc<dyn LLMProvider>>, ExtractError> {
    if config.mode == ExtractionMode::HeuristicOnly {
        return Ok(None);
    }

    if let Some(ref provider) = config.provider {
        return Ok(Some(Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Some(provider));
    }

    match ProviderFactory::from_env() {
        Ok((provider, _embedding)) => Ok(Some(provider)),
        Err(e) => {
            debug!("No LLM provider auto-detected ({}); heuristic only", e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD: &str = "A full paragraph about the subject of the page, long enough to keep.\n\n\
![](https://img.example.net/1.jpg)\n\n\
A second paragraph continuing the article with more detail for readers.\n\n\
A third closing paragraph that wraps the article up.";

    fn heuristic_config() -> ExtractionConfig {
        ExtractionConfig::builder()
            .mode(ExtractionMode::HeuristicOnly)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn extract_from_markdown_heuristic_only() {
        let output = extract_from_markdown(MD, &heuristic_config()).await.unwrap();
        assert_eq!(output.source, ExtractionSource::Heuristic);
        assert_eq!(output.items.len(), 3);
        assert_eq!(output.stats.poll_attempts, 0);
        assert_eq!(output.stats.input_tokens, 0);
    }

    #[tokio::test]
    async fn empty_markdown_rejected() {
        let err = extract_from_markdown("  \n ", &heuristic_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MarkdownEmpty));
    }

    #[tokio::test]
    async fn content_free_markdown_is_no_content() {
        let err = extract_from_markdown("# Heading only\n", &heuristic_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoContent));
    }

    #[test]
    fn heuristic_only_mode_resolves_no_provider() {
        let provider = resolve_provider(&heuristic_config()).unwrap();
        assert!(provider.is_none());
    }

    // ── Mode dispatch over a scripted backend ────────────────────────────

    use crate::pipeline::llm::ScriptedChat;

    /// One paragraph: below the default `min_heuristic_items` threshold.
    const THIN_MD: &str = "A single short article paragraph standing alone.";

    const SCRIPTED_REPLY: &str = r#"{"data":[
        {"text":"first scripted paragraph","materiels":["https://img.example.net/1.jpg"]},
        {"text":"second scripted paragraph","materiels":[]},
        {"text":"third scripted paragraph","materiels":[]}
    ]}"#;

    fn fast_config(mode: ExtractionMode) -> ExtractionConfig {
        ExtractionConfig::builder()
            .mode(mode)
            .max_retries(0)
            .retry_backoff_ms(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn heuristic_first_consults_llm_below_threshold() {
        let backend = ScriptedChat::new(&[Ok(SCRIPTED_REPLY)]);
        let config = fast_config(ExtractionMode::HeuristicFirst);

        let (items, source, stats) = extract_with(THIN_MD, &config, Some(&backend))
            .await
            .unwrap();
        assert_eq!(source, ExtractionSource::Llm);
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0].materials,
            vec!["https://img.example.net/1.jpg".to_string()]
        );
        assert_eq!(stats.input_tokens, 120);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn heuristic_first_skips_llm_when_enough_items() {
        let backend = ScriptedChat::new(&[Ok(SCRIPTED_REPLY)]);
        let config = fast_config(ExtractionMode::HeuristicFirst);

        // MD yields three heuristic items, meeting the threshold.
        let (items, source, _) = extract_with(MD, &config, Some(&backend)).await.unwrap();
        assert_eq!(source, ExtractionSource::Heuristic);
        assert_eq!(items.len(), 3);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn heuristic_first_keeps_heuristic_when_llm_fails() {
        let backend = ScriptedChat::new(&[]);
        let config = fast_config(ExtractionMode::HeuristicFirst);

        let (items, source, stats) = extract_with(THIN_MD, &config, Some(&backend))
            .await
            .unwrap();
        assert_eq!(source, ExtractionSource::Heuristic);
        assert_eq!(items.len(), 1);
        assert_eq!(stats.input_tokens, 0);
        assert!(backend.call_count() >= 1, "the LLM must have been consulted");
    }

    #[tokio::test]
    async fn llm_first_falls_back_to_heuristic_on_provider_error() {
        let backend = ScriptedChat::new(&[]);
        let config = fast_config(ExtractionMode::LlmFirst);

        let (items, source, _) = extract_with(MD, &config, Some(&backend)).await.unwrap();
        assert_eq!(source, ExtractionSource::Heuristic);
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn llm_first_uses_llm_items_on_success() {
        let backend = ScriptedChat::new(&[Ok(SCRIPTED_REPLY)]);
        let config = fast_config(ExtractionMode::LlmFirst);

        let (items, source, stats) = extract_with(MD, &config, Some(&backend))
            .await
            .unwrap();
        assert_eq!(source, ExtractionSource::Llm);
        assert_eq!(items.len(), 3);
        assert_eq!(stats.output_tokens, 40);
    }
}
