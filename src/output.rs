//! Output types: extracted items, run statistics, and the wire envelope.
//!
//! [`ExtractOutput`] is the library-level result — items plus enough
//! statistics to understand where the time and tokens went. The HTTP and
//! CLI surfaces wrap it in [`ApiEnvelope`], the `{code, data, msg}` shape
//! downstream consumers of the original service already parse.

use serde::{Deserialize, Serialize};

/// One extracted text paragraph with its associated image URLs.
///
/// The wire field for images is spelled `materiels`; that misspelling is
/// the established contract of the service this crate replaces, and
/// downstream consumers depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    /// Cleaned paragraph text, never shorter than the configured minimum.
    pub text: String,
    /// Image URLs paired with this paragraph. May be empty.
    #[serde(rename = "materiels", default)]
    pub materials: Vec<String>,
}

/// Which extraction path produced the final items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// The deterministic regex extractor.
    Heuristic,
    /// The LLM provider.
    Llm,
}

/// Statistics for a single crawl-and-extract run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractStats {
    /// Poll attempts performed before content was available (0 when the
    /// pipeline started from Markdown directly).
    pub poll_attempts: u32,
    /// Whether partial (still-scraping) crawler content was used.
    pub used_partial_content: bool,
    /// Length of the crawled Markdown in chars, before truncation.
    pub markdown_chars: usize,
    /// Provider-reported input tokens (0 on the heuristic path).
    pub input_tokens: usize,
    /// Provider-reported output tokens (0 on the heuristic path).
    pub output_tokens: usize,
    /// Wall-clock time spent crawling and polling, in milliseconds.
    pub crawl_duration_ms: u64,
    /// Wall-clock time spent in LLM calls, in milliseconds.
    pub llm_duration_ms: u64,
    /// Total wall-clock time for the run, in milliseconds.
    pub total_duration_ms: u64,
}

/// Result of a crawl-and-extract run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOutput {
    /// Normalized text/image items, never empty.
    pub items: Vec<ExtractedItem>,
    /// Which path produced the items.
    pub source: ExtractionSource,
    /// Run statistics.
    pub stats: ExtractStats,
}

/// The `{code, data, msg}` envelope served over HTTP and printed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub code: u16,
    pub data: Vec<ExtractedItem>,
    pub msg: String,
}

impl ApiEnvelope {
    /// Wrap a successful extraction.
    pub fn success(items: Vec<ExtractedItem>) -> Self {
        Self {
            code: 200,
            data: items,
            msg: "success".to_string(),
        }
    }
}

impl From<ExtractOutput> for ApiEnvelope {
    fn from(output: ExtractOutput) -> Self {
        ApiEnvelope::success(output.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serialises_with_wire_spelling() {
        let item = ExtractedItem {
            text: "A paragraph".into(),
            materials: vec!["https://cdn.example.net/a.jpg".into()],
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("materiels").is_some());
        assert!(json.get("materials").is_none());
    }

    #[test]
    fn item_deserialises_without_materials() {
        let item: ExtractedItem = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert!(item.materials.is_empty());
    }

    #[test]
    fn envelope_success_shape() {
        let env = ApiEnvelope::success(vec![ExtractedItem {
            text: "hello world".into(),
            materials: vec![],
        }]);
        assert_eq!(env.code, 200);
        assert_eq!(env.msg, "success");
        assert_eq!(env.data.len(), 1);
    }
}
