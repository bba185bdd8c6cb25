//! # marksift
//!
//! Crawl a URL to Markdown and sift it into paired text/image items.
//!
//! ## Why this crate?
//!
//! Turning an arbitrary web page into clean "paragraph + its images" pairs
//! takes three external collaborators: a crawler that renders the page to
//! Markdown, and an LLM that understands which paragraphs matter and which
//! figure belongs to which paragraph. LLMs are slow, cost money, and are
//! sometimes simply down — so this crate also ships a deterministic regex
//! extractor and lets the two paths back each other up.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Crawl     submit to a Firecrawl-compatible crawler service
//!  ├─ 2. Poll      bounded wait for Markdown (partial content salvaged)
//!  ├─ 3. Extract   LLM (OpenAI-compatible / Ollama) or regex pairing
//!  ├─ 4. Recover   pull JSON out of imperfect LLM replies
//!  └─ 5. Normalize {code, data: [{text, materiels}], msg} envelope
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marksift::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from the environment; without one the
//!     // pipeline runs on the regex extractor alone.
//!     let config = ExtractionConfig::default();
//!     let output = extract("https://news.example.net/article", &config).await?;
//!     for item in &output.items {
//!         println!("{} ({} images)", item.text, item.materials.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `marksift` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables the axum HTTP service ([`server`]) |
//!
//! Disable both when using only the library:
//! ```toml
//! marksift = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ExtractionMode};
pub use error::ExtractError;
pub use extract::{extract, extract_from_markdown, extract_sync};
pub use output::{ApiEnvelope, ExtractOutput, ExtractStats, ExtractedItem, ExtractionSource};
