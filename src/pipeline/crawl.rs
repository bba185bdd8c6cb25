//! Crawl submission: POST the target URL to the crawler service.
//!
//! The crawler speaks the Firecrawl v1 wire format: a crawl is submitted to
//! `{base}/crawl` and answered with a job id plus a result URL to poll.
//! Only Markdown output is requested — the extraction stages never look at
//! raw HTML.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

// ── Wire types ───────────────────────────────────────────────────────────

/// Request body for `POST {base}/crawl`.
#[derive(Debug, Serialize)]
pub struct CrawlRequest<'a> {
    pub url: &'a str,
    pub limit: u32,
    #[serde(rename = "scrapeOptions")]
    pub scrape_options: ScrapeOptions,
}

/// Scrape options nested in the crawl request.
#[derive(Debug, Serialize)]
pub struct ScrapeOptions {
    pub formats: Vec<&'static str>,
}

/// Response body of `POST {base}/crawl`.
#[derive(Debug, Deserialize)]
pub struct CrawlSubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
    /// Some deployments return the poll URL directly.
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body of `GET {poll_url}` (crawl status).
#[derive(Debug, Deserialize)]
pub struct CrawlStatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Vec<CrawlDocument>,
}

/// One crawled document inside a status response.
#[derive(Debug, Deserialize)]
pub struct CrawlDocument {
    #[serde(default)]
    pub markdown: Option<String>,
}

impl CrawlStatusResponse {
    /// The first non-empty Markdown document, if any.
    pub fn markdown(&self) -> Option<&str> {
        self.data
            .iter()
            .find_map(|d| d.markdown.as_deref())
            .filter(|md| !md.is_empty())
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// A submitted crawl job: the URL to poll for its result.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub poll_url: String,
}

/// Thin reqwest wrapper around the crawler API.
pub struct CrawlerClient {
    http: reqwest::Client,
    base_url: String,
    downgrade_poll_url: bool,
}

impl CrawlerClient {
    /// Build a client from the pipeline configuration.
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.crawl_timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.crawler_base_url.clone(),
            downgrade_poll_url: config.downgrade_poll_url,
        })
    }

    /// Submit a crawl for `url` and return the job to poll.
    pub async fn start_crawl(
        &self,
        url: &str,
        limit: u32,
    ) -> Result<CrawlJob, ExtractError> {
        let endpoint = format!("{}/crawl", self.base_url);
        let body = CrawlRequest {
            url,
            limit,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        info!("Submitting crawl for {} to {}", url, endpoint);

        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::CrawlRequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ExtractError::CrawlRequestFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let submit: CrawlSubmitResponse =
            response
                .json()
                .await
                .map_err(|e| ExtractError::CrawlRequestFailed {
                    url: url.to_string(),
                    reason: format!("invalid response body: {e}"),
                })?;

        if !submit.success {
            return Err(ExtractError::CrawlRejected {
                url: url.to_string(),
            });
        }

        let poll_url = self.resolve_poll_url(&submit)?;
        debug!("Crawl accepted, polling {}", poll_url);

        Ok(CrawlJob { poll_url })
    }

    /// Fetch the current status of a crawl job.
    pub async fn fetch_status(
        &self,
        job: &CrawlJob,
    ) -> Result<CrawlStatusResponse, ExtractError> {
        let response = self.http.get(&job.poll_url).send().await.map_err(|e| {
            ExtractError::PollRequestFailed {
                poll_url: job.poll_url.clone(),
                reason: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            return Err(ExtractError::PollRequestFailed {
                poll_url: job.poll_url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ExtractError::PollRequestFailed {
                poll_url: job.poll_url.clone(),
                reason: format!("invalid response body: {e}"),
            })
    }

    /// Derive the poll URL from a submit response.
    ///
    /// Prefers the explicit `url` field; falls back to `{base}/crawl/{id}`.
    /// Applies the https→http downgrade when configured.
    fn resolve_poll_url(&self, submit: &CrawlSubmitResponse) -> Result<String, ExtractError> {
        let url = match (&submit.url, &submit.id) {
            (Some(url), _) if !url.is_empty() => url.clone(),
            (_, Some(id)) if !id.is_empty() => format!("{}/crawl/{}", self.base_url, id),
            _ => return Err(ExtractError::PollUrlMissing),
        };

        Ok(if self.downgrade_poll_url {
            downgrade_https(&url)
        } else {
            url
        })
    }
}

/// Rewrite an `https://` URL to `http://`; everything else passes through.
pub fn downgrade_https(url: &str) -> String {
    match url.strip_prefix("https://") {
        Some(rest) => format!("http://{rest}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CrawlerClient {
        CrawlerClient::new(&ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn downgrade_rewrites_scheme_only() {
        assert_eq!(
            downgrade_https("https://crawler:3002/v1/crawl/abc"),
            "http://crawler:3002/v1/crawl/abc"
        );
        assert_eq!(downgrade_https("http://crawler/x"), "http://crawler/x");
        // No scheme — untouched
        assert_eq!(downgrade_https("crawler/x"), "crawler/x");
    }

    #[test]
    fn poll_url_prefers_explicit_url() {
        let submit = CrawlSubmitResponse {
            success: true,
            id: Some("job-1".into()),
            url: Some("https://crawler:3002/v1/crawl/job-1".into()),
        };
        let url = client().resolve_poll_url(&submit).unwrap();
        assert_eq!(url, "http://crawler:3002/v1/crawl/job-1");
    }

    #[test]
    fn poll_url_built_from_id() {
        let submit = CrawlSubmitResponse {
            success: true,
            id: Some("job-2".into()),
            url: None,
        };
        let url = client().resolve_poll_url(&submit).unwrap();
        assert_eq!(url, "http://localhost:3002/v1/crawl/job-2");
    }

    #[test]
    fn poll_url_missing_is_an_error() {
        let submit = CrawlSubmitResponse {
            success: true,
            id: None,
            url: Some(String::new()),
        };
        assert!(matches!(
            client().resolve_poll_url(&submit),
            Err(ExtractError::PollUrlMissing)
        ));
    }

    #[test]
    fn crawl_request_wire_shape() {
        let body = CrawlRequest {
            url: "https://news.example.net/article",
            limit: 2000,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["limit"], 2000);
        assert_eq!(json["scrapeOptions"]["formats"][0], "markdown");
    }

    #[test]
    fn status_response_markdown_skips_empty_documents() {
        let status: CrawlStatusResponse = serde_json::from_str(
            r##"{"success":true,"status":"completed",
                "data":[{"markdown":""},{"markdown":"# Hello"}]}"##,
        )
        .unwrap();
        assert_eq!(status.markdown(), Some("# Hello"));
    }

    #[test]
    fn status_response_tolerates_missing_fields() {
        let status: CrawlStatusResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!status.success);
        assert!(status.status.is_none());
        assert!(status.markdown().is_none());
    }
}
