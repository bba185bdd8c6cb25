//! Heuristic extraction: deterministic regex-based text/image pairing.
//!
//! This is the LLM-free path. It cannot understand layout semantics, but it
//! is instant, free, and good enough for the common article shape: prose
//! paragraphs interleaved with figures. It serves both as the default
//! extractor and as the safety net when the LLM is unavailable or returns
//! garbage.
//!
//! ## Pairing strategy
//!
//! 1. Collect every image URL in the document (`![…](url)` and
//!    `<img src=…>`), in order of appearance.
//! 2. Split the document into paragraphs on blank lines; drop navigation
//!    link lists, headings, and paragraphs below the minimum length.
//! 3. A paragraph containing images keeps exactly those images.
//! 4. A paragraph without images claims the next unclaimed document image —
//!    figures usually follow the prose that references them.
//! 5. Early paragraphs (first ten items) with nothing to claim inherit the
//!    previous item's images rather than going bare.
//! 6. If no paragraph survives but images exist, fall back to sentence
//!    splitting and pair the first ten sentences with images.

use crate::output::ExtractedItem;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]*)\)").unwrap());

static RE_HTML_IMG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]*?src=['"]([^'"]+)['"][^>]*>"#).unwrap());

static RE_PARAGRAPH_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

static RE_HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#.*$").unwrap());

static RE_SENTENCE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.。!！?？;；…]+\s*").unwrap());

/// Upper bound on items that may inherit images from their predecessor,
/// and on sentences produced by the fallback splitter.
const EARLY_ITEM_LIMIT: usize = 10;

/// Minimum sentence length (chars) for the fallback splitter.
const MIN_SENTENCE_CHARS: usize = 20;

/// Extract text/image pairs from Markdown without an LLM.
pub fn extract_pairs(markdown: &str, min_text_chars: usize) -> Vec<ExtractedItem> {
    let all_images = collect_images(markdown);
    let mut next_unclaimed = 0usize;
    let mut items: Vec<ExtractedItem> = Vec::new();

    for paragraph in RE_PARAGRAPH_SPLIT.split(markdown) {
        if is_boilerplate(paragraph, min_text_chars) {
            continue;
        }

        let paragraph_images = collect_images(paragraph);
        let text = clean_paragraph(paragraph);
        if text.chars().count() < min_text_chars {
            continue;
        }

        let materials = if !paragraph_images.is_empty() {
            paragraph_images
        } else if next_unclaimed < all_images.len() {
            let img = all_images[next_unclaimed].clone();
            next_unclaimed += 1;
            vec![img]
        } else if !items.is_empty() && items.len() < EARLY_ITEM_LIMIT {
            items.last().map(|i| i.materials.clone()).unwrap_or_default()
        } else {
            vec![]
        };

        items.push(ExtractedItem { text, materials });
    }

    if items.is_empty() && !all_images.is_empty() {
        return sentence_fallback(markdown, &all_images);
    }

    items
}

/// All image URLs in order of appearance (Markdown links first, then HTML).
fn collect_images(input: &str) -> Vec<String> {
    RE_MD_IMAGE
        .captures_iter(input)
        .chain(RE_HTML_IMG.captures_iter(input))
        .map(|caps| caps[1].trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Paragraphs that carry navigation rather than content.
fn is_boilerplate(paragraph: &str, min_text_chars: usize) -> bool {
    let trimmed = paragraph.trim();
    if trimmed.is_empty() || trimmed.chars().count() < min_text_chars {
        return true;
    }
    // Headings carry structure, not content.
    if trimmed.starts_with('#') {
        return true;
    }
    // Bullet lists of links are almost always navigation or a table of
    // contents.
    if (trimmed.starts_with('*') || trimmed.starts_with('-'))
        && trimmed.contains('[')
        && trimmed.contains("](")
    {
        return true;
    }
    false
}

/// Strip image markup and collapse a paragraph to a single line of text.
fn clean_paragraph(paragraph: &str) -> String {
    let s = RE_MD_IMAGE.replace_all(paragraph, "");
    let s = RE_HTML_IMG.replace_all(&s, "");
    RE_NEWLINES.replace_all(&s, " ").trim().to_string()
}

/// Last-resort extraction: split the whole document into sentences and pair
/// them with the document images positionally.
fn sentence_fallback(markdown: &str, all_images: &[String]) -> Vec<ExtractedItem> {
    let s = RE_MD_IMAGE.replace_all(markdown, "");
    let s = RE_HTML_IMG.replace_all(&s, "");
    let s = RE_HEADING_LINE.replace_all(&s, "");

    RE_SENTENCE_SPLIT
        .split(&s)
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
        .take(EARLY_ITEM_LIMIT)
        .enumerate()
        .map(|(i, sentence)| {
            let img_index = i.min(all_images.len() - 1);
            ExtractedItem {
                text: RE_NEWLINES.replace_all(sentence, " ").to_string(),
                materials: vec![all_images[img_index].clone()],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "\
# A Travel Report

* [Home](https://site.example.net/)
* [Archive](https://site.example.net/archive)

The first morning we walked along the harbour and watched the boats \
come in with the tide.

![](https://img.example.net/harbour.jpg)

Lunch was grilled fish at a small family restaurant near the market \
square, busy with locals.

<img src=\"https://img.example.net/market.jpg\" alt=\"market\">

In the evening the lighthouse opened for visitors and the view from \
the top stretched for miles.
";

    #[test]
    fn pairs_paragraphs_with_following_images() {
        let items = extract_pairs(ARTICLE, 5);
        assert_eq!(items.len(), 3);

        // Paragraphs have no inline images, so they claim document images
        // in order of appearance: Markdown images first, then HTML ones.
        assert!(items[0].text.starts_with("The first morning"));
        assert_eq!(items[0].materials, vec!["https://img.example.net/harbour.jpg"]);
        assert_eq!(items[1].materials, vec!["https://img.example.net/market.jpg"]);
    }

    #[test]
    fn navigation_and_headings_skipped() {
        let items = extract_pairs(ARTICLE, 5);
        assert!(items.iter().all(|i| !i.text.contains("Home")));
        assert!(items.iter().all(|i| !i.text.starts_with('#')));
    }

    #[test]
    fn inline_images_stay_with_their_paragraph() {
        let md = "A paragraph with its own figure ![](https://img.example.net/own.png) inline.\n\n\
                  Another paragraph without one.";
        let items = extract_pairs(md, 5);
        assert_eq!(items[0].materials, vec!["https://img.example.net/own.png"]);
        assert!(!items[0].text.contains("!["), "image markup must be stripped");
    }

    #[test]
    fn image_markup_stripped_from_text() {
        let md = "Before ![alt text](https://img.example.net/x.png) after, spanning\nlines.";
        let items = extract_pairs(md, 5);
        assert_eq!(items[0].text, "Before  after, spanning lines.");
    }

    #[test]
    fn early_items_inherit_previous_images() {
        let md = "First paragraph of the article body.\n\n\
                  ![](https://img.example.net/only.jpg)\n\n\
                  Second paragraph with no image of its own.\n\n\
                  Third paragraph, also bare.";
        let items = extract_pairs(md, 5);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].materials, vec!["https://img.example.net/only.jpg"]);
        // The single document image is claimed; later items inherit.
        assert_eq!(items[1].materials, items[0].materials);
        assert_eq!(items[2].materials, items[1].materials);
    }

    #[test]
    fn sentence_fallback_when_no_paragraphs_survive() {
        // Every paragraph is a link list, so paragraph extraction yields
        // nothing — but images exist, so the sentence splitter takes over.
        let md = "* [Gallery](https://site.example.net/g) the complete photo set from the trip.\n\n\
![](https://img.example.net/a.jpg)\n\n\
* [More](https://site.example.net/m) a second long description sentence for the archive.\n\n\
![](https://img.example.net/b.jpg)\n";
        let items = extract_pairs(md, 5);
        assert!(!items.is_empty());
        assert!(items.iter().all(|i| i.materials.len() == 1));
    }

    #[test]
    fn no_text_no_images_yields_nothing() {
        assert!(extract_pairs("# Only\n\n## Headings\n", 5).is_empty());
    }

    #[test]
    fn deterministic_across_runs() {
        let a = extract_pairs(ARTICLE, 5);
        let b = extract_pairs(ARTICLE, 5);
        assert_eq!(a, b);
    }
}
