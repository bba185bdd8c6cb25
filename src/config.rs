//! Configuration types for URL-to-items extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across handlers, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::error::ExtractError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a crawl-and-extract run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use marksift::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .crawler_base_url("http://localhost:3002/v1")
///     .max_poll_attempts(30)
///     .model("moonshot-v1-8k")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Base URL of the Firecrawl-compatible crawler API. Default: `http://localhost:3002/v1`.
    ///
    /// The pipeline POSTs to `{base}/crawl` and polls `{base}/crawl/{id}`.
    /// No trailing slash.
    pub crawler_base_url: String,

    /// Page limit passed to the crawler in the crawl request. Default: 2000.
    ///
    /// The crawler stops following links once this many pages were fetched.
    /// Only the first document's Markdown is consumed here, but a generous
    /// limit keeps the crawler from truncating large single pages.
    pub crawl_limit: u32,

    /// Maximum number of poll attempts against the crawl-status URL. Default: 30.
    ///
    /// Combined with [`poll_interval_ms`](Self::poll_interval_ms) this bounds
    /// the total wait at attempts × interval (90 s by default). Exhausting
    /// the budget with no content surfaces as
    /// [`ExtractError::CrawlInProgress`], which the HTTP layer maps to 202.
    pub max_poll_attempts: u32,

    /// Delay between poll attempts in milliseconds. Default: 3000.
    ///
    /// Crawls of typical article pages finish in 5–30 s. Polling faster than
    /// every few seconds only loads the crawler; polling slower wastes the
    /// caller's latency budget.
    pub poll_interval_ms: u64,

    /// Minimum attempts before partial content may be used. Default: 15.
    ///
    /// The crawler streams documents into its status response while still
    /// scraping. If Markdown is already present after this many attempts,
    /// the pipeline stops waiting for `completed` and processes what it has.
    /// Set to `max_poll_attempts` to always wait for completion.
    pub min_poll_attempts_for_partial: u32,

    /// Timeout for each individual HTTP call to the crawler, in seconds. Default: 30.
    pub crawl_timeout_secs: u64,

    /// Downgrade `https://` poll URLs to `http://`. Default: true.
    ///
    /// Crawler deployments commonly advertise an `https` result URL while
    /// actually serving plain HTTP on the same port. The downgrade matches
    /// what the submit request used.
    pub downgrade_poll_url: bool,

    /// LLM model identifier, e.g. "moonshot-v1-8k", "deepseek-r1:8b".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the LLM completion. Default: 0.1.
    ///
    /// Extraction is transcription, not creative writing. Low temperature
    /// keeps the model faithful to the page content and to the requested
    /// JSON shape.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 4000.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    ///
    /// Covers both API errors and replies from which no JSON could be
    /// recovered — a re-roll at temperature 0.1 usually fixes the latter.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 2000.
    ///
    /// Doubles after each attempt: 2 s → 4 s → 8 s.
    pub retry_backoff_ms: u64,

    /// Character budget for the Markdown sent to the LLM. Default: 10 000.
    ///
    /// Keeps prompt size (and cost) bounded on huge pages. Truncation
    /// happens on a char boundary; the heuristic extractor always sees the
    /// full document.
    pub max_markdown_chars: usize,

    /// Minimum text length (chars) for an item to survive normalization. Default: 5.
    ///
    /// Filters out stray bullets, bare punctuation and navigation crumbs
    /// regardless of which path produced them.
    pub min_text_chars: usize,

    /// Heuristic item count below which the LLM is consulted. Default: 3.
    ///
    /// Only meaningful in [`ExtractionMode::HeuristicFirst`]: a page that
    /// yields one or two heuristic items is usually a layout the regex
    /// rules do not understand, and worth an LLM call.
    pub min_heuristic_items: usize,

    /// Which extraction path runs first, and whether the other is a fallback.
    /// Default: [`ExtractionMode::HeuristicFirst`].
    pub mode: ExtractionMode,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            crawler_base_url: "http://localhost:3002/v1".to_string(),
            crawl_limit: 2000,
            max_poll_attempts: 30,
            poll_interval_ms: 3000,
            min_poll_attempts_for_partial: 15,
            crawl_timeout_secs: 30,
            downgrade_poll_url: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4000,
            max_retries: 3,
            retry_backoff_ms: 2000,
            max_markdown_chars: 10_000,
            min_text_chars: 5,
            min_heuristic_items: 3,
            mode: ExtractionMode::default(),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("crawler_base_url", &self.crawler_base_url)
            .field("crawl_limit", &self.crawl_limit)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field(
                "min_poll_attempts_for_partial",
                &self.min_poll_attempts_for_partial,
            )
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_markdown_chars", &self.max_markdown_chars)
            .field("mode", &self.mode)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn crawler_base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.config.crawler_base_url = url;
        self
    }

    pub fn crawl_limit(mut self, limit: u32) -> Self {
        self.config.crawl_limit = limit.max(1);
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n.max(1);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn min_poll_attempts_for_partial(mut self, n: u32) -> Self {
        self.config.min_poll_attempts_for_partial = n;
        self
    }

    pub fn crawl_timeout_secs(mut self, secs: u64) -> Self {
        self.config.crawl_timeout_secs = secs.max(1);
        self
    }

    pub fn downgrade_poll_url(mut self, v: bool) -> Self {
        self.config.downgrade_poll_url = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_markdown_chars(mut self, n: usize) -> Self {
        self.config.max_markdown_chars = n.max(100);
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn min_heuristic_items(mut self, n: usize) -> Self {
        self.config.min_heuristic_items = n;
        self
    }

    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.crawler_base_url.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "crawler_base_url must not be empty".into(),
            ));
        }
        if !c.crawler_base_url.starts_with("http://")
            && !c.crawler_base_url.starts_with("https://")
        {
            return Err(ExtractError::InvalidConfig(format!(
                "crawler_base_url must be an HTTP(S) URL, got '{}'",
                c.crawler_base_url
            )));
        }
        if c.min_poll_attempts_for_partial > c.max_poll_attempts {
            return Err(ExtractError::InvalidConfig(format!(
                "min_poll_attempts_for_partial ({}) exceeds max_poll_attempts ({})",
                c.min_poll_attempts_for_partial, c.max_poll_attempts
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which extraction path runs first, and whether the other is a fallback.
///
/// Two paths exist because they fail differently: the heuristic is free and
/// deterministic but blind to layout semantics; the LLM understands layout
/// but costs money, adds seconds of latency, and occasionally returns
/// garbage. The modes encode the three sensible combinations:
///
/// | Mode | First | Fallback | Use case |
/// |------|-------|----------|----------|
/// | `HeuristicFirst` | regex | LLM when too few items | default service path |
/// | `LlmFirst` | LLM | regex on LLM failure | quality-sensitive callers |
/// | `HeuristicOnly` | regex | none | offline, tests, no provider |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Run the regex extractor; consult the LLM only when it produced fewer
    /// than `min_heuristic_items` items, and fall back to the regex result
    /// if the LLM fails. (default)
    #[default]
    HeuristicFirst,
    /// Ask the LLM first; fall back to the regex extractor on any LLM error.
    LlmFirst,
    /// Never touch the LLM. Also used implicitly when no provider resolves.
    HeuristicOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = ExtractionConfig::builder().build().unwrap();
        assert_eq!(config.max_poll_attempts, 30);
        assert_eq!(config.poll_interval_ms, 3000);
        assert_eq!(config.mode, ExtractionMode::HeuristicFirst);
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let config = ExtractionConfig::builder()
            .crawler_base_url("http://crawler:3002/v1/")
            .build()
            .unwrap();
        assert_eq!(config.crawler_base_url, "http://crawler:3002/v1");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ExtractionConfig::builder()
            .crawler_base_url("crawler:3002")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("HTTP"));
    }

    #[test]
    fn rejects_partial_threshold_above_budget() {
        let err = ExtractionConfig::builder()
            .max_poll_attempts(10)
            .min_poll_attempts_for_partial(20)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn temperature_clamped() {
        let config = ExtractionConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(config.temperature, 2.0);
    }
}
