//! Error types for the marksift library.
//!
//! A single fatal error enum covers the whole pipeline. One variant is
//! special: [`ExtractError::CrawlInProgress`] is not a hard failure — the
//! crawler simply had not finished within the polling budget. The HTTP
//! surface maps it to `202 Accepted` so callers can retry later; every
//! other variant maps to a 4xx/5xx.

use thiserror::Error;

/// All fatal errors returned by the marksift library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Crawl errors ──────────────────────────────────────────────────────
    /// The POST to the crawler's `/crawl` endpoint failed at the HTTP level.
    #[error("Failed to submit crawl for '{url}': {reason}\nCheck that the crawler service is reachable.")]
    CrawlRequestFailed { url: String, reason: String },

    /// The crawler accepted the request but reported `success: false`.
    #[error("Crawler rejected the crawl request for '{url}'")]
    CrawlRejected { url: String },

    /// The crawl-submit response carried no job id to poll.
    #[error("Crawler response did not contain a poll URL or job id")]
    PollUrlMissing,

    /// A GET against the poll URL failed at the HTTP level.
    #[error("Failed to fetch crawl status from '{poll_url}': {reason}")]
    PollRequestFailed { poll_url: String, reason: String },

    /// The crawler reported a terminal status other than `completed`.
    #[error("Crawl ended with status '{status}'")]
    CrawlFailed { status: String },

    /// The polling budget ran out and no usable content was observed.
    ///
    /// Maps to HTTP 202: the crawl is still running, try again later.
    #[error("Crawl still in progress after {attempts} polling attempts")]
    CrawlInProgress { attempts: u32 },

    // ── Content errors ────────────────────────────────────────────────────
    /// The crawl completed but the result carried no Markdown document.
    #[error("Crawl result did not contain Markdown content")]
    MarkdownMissing,

    /// The crawl result carried a Markdown document with no content.
    #[error("Crawl result contained an empty Markdown document")]
    MarkdownEmpty,

    /// Extraction produced no items that survive normalization.
    #[error("No usable text/image items could be extracted from the page")]
    NoContent,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call failed after all retries.
    #[error("LLM extraction failed after {retries} retries: {detail}")]
    LlmFailed { retries: u32, detail: String },

    /// The LLM replied, but no JSON could be recovered from the reply.
    #[error("Could not recover a JSON object or array from the LLM reply: {detail}")]
    LlmOutputUnparseable { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Whether this error means "not done yet" rather than "failed".
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ExtractError::CrawlInProgress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_display_mentions_attempts() {
        let e = ExtractError::CrawlInProgress { attempts: 30 };
        assert!(e.to_string().contains("30"));
        assert!(e.is_in_progress());
    }

    #[test]
    fn crawl_failed_display() {
        let e = ExtractError::CrawlFailed {
            status: "cancelled".into(),
        };
        assert!(e.to_string().contains("cancelled"));
        assert!(!e.is_in_progress());
    }

    #[test]
    fn llm_failed_display() {
        let e = ExtractError::LlmFailed {
            retries: 3,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 retries"), "got: {msg}");
        assert!(msg.contains("connection refused"));
    }
}
