//! Prompts for LLM-based text/image extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the extraction behaviour (e.g.
//!    what counts as boilerplate) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    calling a real LLM, making prompt regressions easy to catch.

/// System message establishing the assistant's role.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a professional data-processing assistant that extracts structured \
data from Markdown and outputs strict JSON.";

/// Instructions preceding the Markdown document in the user message.
///
/// The `materiels` spelling in the schema is deliberate — it is the wire
/// contract consumed downstream (see [`crate::output::ExtractedItem`]).
pub const EXTRACTION_INSTRUCTIONS: &str = r#"Process the Markdown content below according to these rules:

1. INPUT
   - Raw Markdown text containing text paragraphs and image links.

2. TASK
   - Extract every meaningful text paragraph. Discard blank lines,
     navigation links, advertisements, tables of contents and footers.
   - Extract every image URL (links in `![](...)` or `<img>` form).
   - Pair text with images: each paragraph is followed by the image or
     images that belong to it.

3. OUTPUT FORMAT
   Return ONLY JSON of exactly this shape, with no prefix, commentary or
   surrounding text:
   {
       "data": [
           {
               "text": "first paragraph",
               "materiels": ["https://example.net/image1.jpg"]
           }
       ]
   }

The Markdown content follows:
"#;

/// Build the full user prompt for a Markdown document.
///
/// `markdown` must already be truncated to the configured character budget;
/// this function does no size enforcement of its own.
pub fn extraction_prompt(markdown: &str) -> String {
    format!("{EXTRACTION_INSTRUCTIONS}\n{markdown}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_markdown() {
        let p = extraction_prompt("# Title\n\nBody text");
        assert!(p.contains("# Title"));
        assert!(p.contains("materiels"));
    }

    #[test]
    fn prompt_demands_bare_json() {
        assert!(EXTRACTION_INSTRUCTIONS.contains("ONLY JSON"));
    }
}
