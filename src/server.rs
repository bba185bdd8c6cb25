//! HTTP surface: the axum application serving the extraction pipeline.
//!
//! Routes mirror the service this crate replaces:
//!
//! | Route | Method | Path taken |
//! |-------|--------|------------|
//! | `/api/v1/text/urlCrawl` | POST `{"url": …}` | LLM first, heuristic fallback |
//! | `/v1/text/urlCrawl?url=…` | GET | LLM first, heuristic fallback |
//! | `/image-to-ai/crawler` | POST `{"url": …}` | heuristic first, LLM backup |
//! | `/health` | GET | liveness probe |
//!
//! Every response is the `{code, data, msg}` envelope. A crawl that has not
//! finished within the polling budget is not an error to the caller — it
//! maps to `202 Accepted` with `data.status = "processing"` so clients can
//! retry.
//!
//! CORS is wide open (the original service sat behind an internal gateway)
//! and every request is traced with an id and elapsed time.

use crate::config::{ExtractionConfig, ExtractionMode};
use crate::error::ExtractError;
use crate::extract;
use crate::output::ApiEnvelope;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state: one config per extraction flavour, derived from the same
/// base so crawler/poll settings stay identical across routes.
pub struct AppState {
    llm_first: ExtractionConfig,
    heuristic_first: ExtractionConfig,
}

impl AppState {
    pub fn new(base: ExtractionConfig) -> Self {
        let mut llm_first = base.clone();
        llm_first.mode = ExtractionMode::LlmFirst;
        let mut heuristic_first = base;
        heuristic_first.mode = ExtractionMode::HeuristicFirst;
        Self {
            llm_first,
            heuristic_first,
        }
    }
}

/// Build the axum application.
pub fn router(config: ExtractionConfig) -> Router {
    let state = Arc::new(AppState::new(config));

    Router::new()
        .route("/api/v1/text/urlCrawl", post(url_crawl_post))
        .route("/v1/text/urlCrawl", get(url_crawl_get))
        .route("/image-to-ai/crawler", post(image_to_ai_post))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the application until the task is cancelled.
pub async fn serve(addr: SocketAddr, config: ExtractionConfig) -> Result<(), ExtractError> {
    let app = router(config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ExtractError::Internal(format!("Failed to bind {addr}: {e}")))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| ExtractError::Internal(format!("Server error: {e}")))
}

// ── Request types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UrlBody {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn url_crawl_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UrlBody>,
) -> Result<Json<ApiEnvelope>, ApiError> {
    run(&state.llm_first, &body.url).await
}

async fn url_crawl_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<ApiEnvelope>, ApiError> {
    run(&state.llm_first, &query.url).await
}

async fn image_to_ai_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UrlBody>,
) -> Result<Json<ApiEnvelope>, ApiError> {
    run(&state.heuristic_first, &body.url).await
}

async fn health() -> Json<serde_json::Value> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

/// Run the pipeline for one request, with an id and timing in the logs.
async fn run(config: &ExtractionConfig, url: &str) -> Result<Json<ApiEnvelope>, ApiError> {
    let request_id = next_request_id();
    let start = Instant::now();
    info!("[{}] Processing URL: {}", request_id, url);

    match extract::extract(url, config).await {
        Ok(output) => {
            info!(
                "[{}] Done: {} items via {:?} in {}ms",
                request_id,
                output.items.len(),
                output.source,
                start.elapsed().as_millis()
            );
            Ok(Json(ApiEnvelope::from(output)))
        }
        Err(e) if e.is_in_progress() => {
            info!("[{}] Crawl still in progress: {}", request_id, e);
            Err(ApiError(e))
        }
        Err(e) => {
            error!(
                "[{}] Failed after {}ms: {}",
                request_id,
                start.elapsed().as_millis(),
                e
            );
            Err(ApiError(e))
        }
    }
}

/// Monotonic-enough request id: epoch milliseconds, as the original service.
fn next_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("req_{millis}")
}

// ── Error mapping ────────────────────────────────────────────────────────

/// Wrapper turning [`ExtractError`] into an envelope response.
pub struct ApiError(pub ExtractError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ExtractError::CrawlInProgress { .. } => StatusCode::ACCEPTED,
            // Upstream (crawler) failures are gateway errors, not ours.
            ExtractError::CrawlRequestFailed { .. }
            | ExtractError::CrawlRejected { .. }
            | ExtractError::PollRequestFailed { .. }
            | ExtractError::CrawlFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if self.0.is_in_progress() {
            json!({
                "code": status.as_u16(),
                "msg": self.0.to_string(),
                "data": { "status": "processing" },
            })
        } else {
            json!({
                "code": status.as_u16(),
                "msg": self.0.to_string(),
                "data": [],
            })
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_maps_to_202() {
        let err = ApiError(ExtractError::CrawlInProgress { attempts: 30 });
        assert_eq!(err.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn crawler_failures_map_to_502() {
        let err = ApiError(ExtractError::CrawlFailed {
            status: "cancelled".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn everything_else_maps_to_500() {
        let err = ApiError(ExtractError::NoContent);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn router_builds_with_default_config() {
        let _app = router(ExtractionConfig::default());
    }
}
