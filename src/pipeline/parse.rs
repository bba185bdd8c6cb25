//! LLM-output recovery: pull valid JSON out of an imperfect reply.
//!
//! ## Why is recovery necessary?
//!
//! Even well-prompted models decorate their JSON: reasoning models prepend
//! `<think>…</think>` blocks, chat models wrap output in ```json fences or
//! add a polite sentence before the payload, and the item schema drifts
//! (`materials`, `images` or `img` instead of the requested `materiels`).
//! Rejecting such replies would waste a paid completion that is usually
//! 95% usable.
//!
//! This module applies a fixed recovery ladder, then normalizes item
//! shapes. Each rung is a pure function and independently testable.
//!
//! ## Recovery Ladder
//!
//! 1. Strip `<think>…</think>` reasoning blocks
//! 2. Parse the whole reply as JSON
//! 3. Parse the contents of a ```json fenced block
//! 4. Parse the outermost `{…}` object
//! 5. Parse the outermost `[…]` array (wrapped as the `data` list)

use crate::error::ExtractError;
use crate::output::ExtractedItem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Recover a JSON value from a raw LLM reply.
///
/// Returns the parsed value with object/array ambiguity already resolved:
/// a bare array is wrapped into `{"data": […]}` so callers always see an
/// object with a `data` field (or an object they can treat as one item).
pub fn recover_json(reply: &str) -> Result<Value, ExtractError> {
    let cleaned = strip_think_blocks(reply);
    let cleaned = cleaned.trim();

    // Rung 2: the whole reply is already JSON.
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(wrap_bare_array(value));
    }

    // Rung 3: a fenced code block.
    if let Some(caps) = RE_JSON_FENCE.captures(cleaned) {
        if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Ok(wrap_bare_array(value));
        }
    }

    // Rungs 4 and 5: outermost object, then outermost array, ordered by
    // whichever bracket opens first. Both slices are parsed — prose with a
    // stray bracket before the payload must not veto the real JSON.
    let obj = slice_between(cleaned, '{', '}');
    let arr = slice_between(cleaned, '[', ']');

    let (first, second) = match (obj_start(cleaned), arr_start(cleaned)) {
        (Some(o), Some(a)) if o < a => (obj, arr),
        (Some(_), Some(_)) => (arr, obj),
        _ => (obj.or(arr), None),
    };

    for slice in [first, second].into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<Value>(slice) {
            return Ok(wrap_bare_array(value));
        }
    }

    Err(ExtractError::LlmOutputUnparseable {
        detail: format!(
            "no JSON object or array found in {} chars of output",
            cleaned.chars().count()
        ),
    })
}

/// Normalize a recovered JSON value into extraction items.
///
/// Accepts `{"data": […]}`, a bare list, or a single item object. Items
/// with text shorter than `min_text_chars` are dropped.
pub fn normalize_items(value: &Value, min_text_chars: usize) -> Vec<ExtractedItem> {
    let list: Vec<&Value> = match value {
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.iter().collect(),
            // An object without a data list may itself be a single item.
            _ => vec![value],
        },
        Value::Array(items) => items.iter().collect(),
        _ => vec![],
    };

    list.iter()
        .filter_map(|item| normalize_item(item, min_text_chars))
        .collect()
}

/// Normalize one item object; None when it has no usable text.
fn normalize_item(item: &Value, min_text_chars: usize) -> Option<ExtractedItem> {
    let obj = item.as_object()?;
    let text = obj.get("text")?.as_str()?.trim().to_string();
    if text.chars().count() < min_text_chars {
        return None;
    }

    // Accept the schema drift the models actually produce.
    let materials = ["materiels", "materials", "images", "img"]
        .iter()
        .find_map(|key| obj.get(*key))
        .map(coerce_url_list)
        .unwrap_or_default();

    Some(ExtractedItem { text, materials })
}

/// Coerce a JSON value into a list of URL strings.
///
/// A scalar becomes a one-element list; null and non-strings are dropped.
fn coerce_url_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => vec![],
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

static RE_THINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// Remove `<think>…</think>` reasoning blocks emitted by reasoning models.
pub fn strip_think_blocks(input: &str) -> String {
    RE_THINK.replace_all(input, "").trim().to_string()
}

fn obj_start(s: &str) -> Option<usize> {
    s.find('{')
}

fn arr_start(s: &str) -> Option<usize> {
    s.find('[')
}

/// The slice from the first `open` to the last `close`, inclusive.
fn slice_between(s: &str, open: char, close: char) -> Option<&str> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    (end > start).then(|| &s[start..=end])
}

/// Wrap a bare array as `{"data": […]}` so downstream sees one shape.
fn wrap_bare_array(value: Value) -> Value {
    match value {
        Value::Array(items) => serde_json::json!({ "data": items }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_passes_through() {
        let v = recover_json(r#"{"data":[{"text":"hello world","materiels":[]}]}"#).unwrap();
        assert!(v["data"].is_array());
    }

    #[test]
    fn think_block_stripped_before_parsing() {
        let reply = "<think>\nThe user wants JSON.\n</think>\n{\"data\":[]}";
        let v = recover_json(reply).unwrap();
        assert!(v["data"].is_array());
    }

    #[test]
    fn fenced_block_recovered() {
        let reply = "Here is the result:\n```json\n{\"data\": [{\"text\": \"fenced item\"}]}\n```\nLet me know!";
        let v = recover_json(reply).unwrap();
        assert_eq!(v["data"][0]["text"], "fenced item");
    }

    #[test]
    fn object_with_trailing_prose_recovered() {
        let reply = "Sure! {\"data\": [{\"text\": \"sliced item\"}]} Hope that helps.";
        let v = recover_json(reply).unwrap();
        assert_eq!(v["data"][0]["text"], "sliced item");
    }

    #[test]
    fn bare_array_wrapped_into_data() {
        let v = recover_json(r#"[{"text":"array item"}]"#).unwrap();
        assert_eq!(v["data"][0]["text"], "array item");
    }

    #[test]
    fn stray_brace_before_valid_array_recovered() {
        // The `{text, image}` shorthand opens earlier than the payload; the
        // object slice fails to parse and the array slice must still win.
        let reply = "Pairing {text, image} as requested: [{\"text\":\"array after brace\"}]";
        let v = recover_json(reply).unwrap();
        assert_eq!(v["data"][0]["text"], "array after brace");
    }

    #[test]
    fn stray_bracket_before_valid_object_recovered() {
        let reply = "See [1]: {\"data\":[{\"text\":\"object after bracket\"}]}";
        let v = recover_json(reply).unwrap();
        assert_eq!(v["data"][0]["text"], "object after bracket");
    }

    #[test]
    fn prose_only_reply_is_an_error() {
        let err = recover_json("I could not process the document, sorry.").unwrap_err();
        assert!(matches!(err, ExtractError::LlmOutputUnparseable { .. }));
    }

    #[test]
    fn normalize_accepts_schema_drift() {
        let v: Value = serde_json::from_str(
            r#"{"data":[
                {"text":"uses materiels","materiels":["http://a/1.jpg"]},
                {"text":"uses materials","materials":["http://a/2.jpg"]},
                {"text":"uses images","images":"http://a/3.jpg"},
                {"text":"uses img","img":"http://a/4.jpg"}
            ]}"#,
        )
        .unwrap();
        let items = normalize_items(&v, 5);
        assert_eq!(items.len(), 4);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.materials, vec![format!("http://a/{}.jpg", i + 1)]);
        }
    }

    #[test]
    fn normalize_drops_short_text() {
        let v: Value =
            serde_json::from_str(r#"{"data":[{"text":"ok"},{"text":"long enough text"}]}"#)
                .unwrap();
        let items = normalize_items(&v, 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "long enough text");
    }

    #[test]
    fn normalize_single_object_as_item() {
        let v: Value =
            serde_json::from_str(r#"{"text":"a lone item","materiels":[]}"#).unwrap();
        let items = normalize_items(&v, 5);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn normalize_ignores_null_and_empty_urls() {
        let v: Value = serde_json::from_str(
            r#"{"data":[{"text":"with junk urls","materiels":["", null, "http://a/x.png", 7]}]}"#,
        )
        .unwrap();
        let items = normalize_items(&v, 5);
        assert_eq!(items[0].materials, vec!["http://a/x.png".to_string()]);
    }
}
