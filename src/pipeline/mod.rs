//! Pipeline stages for URL-to-items extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different crawler backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! crawl ──▶ poll ──▶ llm ──▶ parse      ─┐
//! (submit)  (wait)   (extract) (recover) ├─▶ normalized items
//!                    heuristic          ─┘
//!                    (regex pairing)
//! ```
//!
//! 1. [`crawl`] — submit the target URL to the crawler and obtain a poll URL
//! 2. [`poll`]  — bounded wait for the crawl to produce Markdown; the only
//!    stage with a sleep loop
//! 3. [`llm`]   — drive the provider call with retry/backoff; the only stage
//!    with LLM network I/O
//! 4. [`parse`] — recover JSON from an imperfect LLM reply and normalize
//!    item shapes
//! 5. [`heuristic`] — deterministic regex extraction used as the default
//!    path and as the fallback when the LLM is unavailable or underperforms

pub mod crawl;
pub mod heuristic;
pub mod llm;
pub mod parse;
pub mod poll;
