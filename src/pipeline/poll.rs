//! Bounded polling for the crawl result.
//!
//! The crawler finishes asynchronously; this module waits for it with a
//! fixed interval and a hard attempt budget. The decision of what to do
//! with each status response is a pure function ([`decide`]) so the
//! branching — which is where the real behaviour lives — is testable
//! without a crawler.
//!
//! ## Partial content
//!
//! The crawler streams documents into its status response while the crawl
//! is still running. For slow sites, waiting for `completed` can blow the
//! whole latency budget even though the first document (the only one this
//! pipeline consumes) arrived long ago. The loop therefore remembers the
//! most recent response that carried Markdown and, once a configured
//! minimum number of attempts has passed, uses it instead of waiting
//! further.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::crawl::{CrawlJob, CrawlStatusResponse, CrawlerClient};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Crawl statuses that mean "keep waiting".
const IN_PROGRESS_STATUSES: &[&str] = &["pending", "processing", "scraping"];

/// What the polling loop should do after seeing one status response.
#[derive(Debug, PartialEq, Eq)]
pub enum PollDecision {
    /// The crawl is done; use this response's content.
    Complete,
    /// Still running, but enough attempts have passed and Markdown is
    /// already available — stop waiting and use the partial content.
    UsePartial,
    /// Still running; sleep and poll again.
    Retry,
    /// Terminal non-success status; give up.
    Failed(String),
}

/// Classify one status response. `attempt` is 1-based.
pub fn decide(
    status: &CrawlStatusResponse,
    attempt: u32,
    config: &ExtractionConfig,
) -> PollDecision {
    let state = status.status.as_deref().unwrap_or("");

    if status.success && state == "completed" {
        return PollDecision::Complete;
    }

    if IN_PROGRESS_STATUSES.contains(&state) {
        if status.markdown().is_some() && attempt >= config.min_poll_attempts_for_partial {
            return PollDecision::UsePartial;
        }
        return PollDecision::Retry;
    }

    PollDecision::Failed(if state.is_empty() {
        "unknown".to_string()
    } else {
        state.to_string()
    })
}

/// Outcome of a successful poll: the Markdown plus how we got it.
#[derive(Debug)]
pub struct PolledContent {
    pub markdown: String,
    pub attempts: u32,
    pub used_partial: bool,
}

/// Poll `job` until Markdown is available or the attempt budget runs out.
pub async fn wait_for_content(
    client: &CrawlerClient,
    job: &CrawlJob,
    config: &ExtractionConfig,
) -> Result<PolledContent, ExtractError> {
    let mut last_markdown: Option<String> = None;

    for attempt in 1..=config.max_poll_attempts {
        let status = client.fetch_status(job).await?;
        let state = status.status.as_deref().unwrap_or("unknown");
        debug!(
            "Poll attempt {}/{}: status '{}'",
            attempt, config.max_poll_attempts, state
        );

        if let Some(md) = status.markdown() {
            last_markdown = Some(md.to_string());
        }

        match decide(&status, attempt, config) {
            PollDecision::Complete => {
                let markdown = status
                    .markdown()
                    .map(str::to_string)
                    .or(last_markdown)
                    .ok_or(ExtractError::MarkdownMissing)?;
                info!("Crawl completed after {} attempts", attempt);
                return Ok(PolledContent {
                    markdown,
                    attempts: attempt,
                    used_partial: false,
                });
            }
            PollDecision::UsePartial => {
                // decide() only returns UsePartial when markdown is present.
                let markdown = last_markdown.ok_or(ExtractError::MarkdownMissing)?;
                warn!(
                    "Crawl still '{}' after {} attempts; using partial content",
                    state, attempt
                );
                return Ok(PolledContent {
                    markdown,
                    attempts: attempt,
                    used_partial: true,
                });
            }
            PollDecision::Retry => {
                if attempt < config.max_poll_attempts {
                    sleep(Duration::from_millis(config.poll_interval_ms)).await;
                }
            }
            PollDecision::Failed(status) => {
                return Err(ExtractError::CrawlFailed { status });
            }
        }
    }

    // Budget exhausted. Salvage partial content if any was seen, otherwise
    // report the crawl as still in progress (HTTP 202 upstream).
    match last_markdown {
        Some(markdown) => {
            warn!(
                "Poll budget ({}) exhausted; using last partial content",
                config.max_poll_attempts
            );
            Ok(PolledContent {
                markdown,
                attempts: config.max_poll_attempts,
                used_partial: true,
            })
        }
        None => Err(ExtractError::CrawlInProgress {
            attempts: config.max_poll_attempts,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(success: bool, state: Option<&str>, markdown: Option<&str>) -> CrawlStatusResponse {
        let data = match markdown {
            Some(md) => format!(r#"[{{"markdown":{}}}]"#, serde_json::json!(md)),
            None => "[]".to_string(),
        };
        let body = format!(
            r#"{{"success":{},"status":{},"data":{}}}"#,
            success,
            match state {
                Some(s) => format!("\"{s}\""),
                None => "null".to_string(),
            },
            data
        );
        serde_json::from_str(&body).unwrap()
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::builder()
            .max_poll_attempts(30)
            .min_poll_attempts_for_partial(15)
            .build()
            .unwrap()
    }

    #[test]
    fn completed_wins_immediately() {
        let s = status(true, Some("completed"), Some("# Done"));
        assert_eq!(decide(&s, 1, &config()), PollDecision::Complete);
    }

    #[test]
    fn completed_requires_success_flag() {
        // status "completed" with success=false is not a completion
        let s = status(false, Some("completed"), Some("# Done"));
        assert!(matches!(decide(&s, 1, &config()), PollDecision::Failed(_)));
    }

    #[test]
    fn in_progress_retries_before_partial_threshold() {
        for state in ["pending", "processing", "scraping"] {
            let s = status(false, Some(state), Some("# Partial"));
            assert_eq!(decide(&s, 14, &config()), PollDecision::Retry);
        }
    }

    #[test]
    fn partial_content_used_after_threshold() {
        let s = status(false, Some("scraping"), Some("# Partial"));
        assert_eq!(decide(&s, 15, &config()), PollDecision::UsePartial);
    }

    #[test]
    fn no_content_never_goes_partial() {
        let s = status(false, Some("scraping"), None);
        assert_eq!(decide(&s, 29, &config()), PollDecision::Retry);
    }

    #[test]
    fn unexpected_status_fails() {
        let s = status(false, Some("cancelled"), None);
        assert_eq!(
            decide(&s, 1, &config()),
            PollDecision::Failed("cancelled".to_string())
        );
    }

    #[test]
    fn missing_status_fails_as_unknown() {
        let s = status(false, None, None);
        assert_eq!(
            decide(&s, 1, &config()),
            PollDecision::Failed("unknown".to_string())
        );
    }
}
