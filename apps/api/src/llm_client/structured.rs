//! Structured output parsing for model responses.
//!
//! Models are asked for a bare JSON object but sometimes wrap it in markdown
//! fences or surround it with prose. Parsing goes: strip fences, try the whole
//! text, fall back to the outermost `{...}` span, require an object, then
//! deserialize into the target record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructuredOutputError {
    #[error("model output is empty")]
    Empty,

    #[error("model output contains no JSON object")]
    NoJson,

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("JSON object does not match the expected shape: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("record rejected: {0}")]
    Invalid(String),
}

/// Parses model text into `T`, which must be deserializable from a JSON object.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, StructuredOutputError> {
    let value = extract_json(text)?;
    if !value.is_object() {
        return Err(StructuredOutputError::NotAnObject(kind_of(&value)));
    }
    serde_json::from_value(value).map_err(StructuredOutputError::Shape)
}

fn extract_json(text: &str) -> Result<Value, StructuredOutputError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(StructuredOutputError::Empty);
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    // Prose around the object: take the outermost brace span.
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(StructuredOutputError::NoJson);
    };
    if end <= start {
        return Err(StructuredOutputError::NoJson);
    }
    serde_json::from_str::<Value>(&text[start..=end]).map_err(|_| StructuredOutputError::NoJson)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Field deserializer that treats an explicit `null` like a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional text field. Strings are kept, other scalars become their string
/// form, and objects, arrays or `null` become `None`.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

/// Text field that falls back to an empty string on anything [`lenient_text`] drops.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// List of short strings. Accepts an array of scalars or a single
/// comma-, semicolon- or newline-separated string; anything else is empty.
pub fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(values) => values.into_iter().filter_map(scalar_text).collect(),
        Value::String(joined) => joined
            .split([',', ';', '\n'])
            .map(|item| item.trim().to_string())
            .collect(),
        _ => Vec::new(),
    };
    Ok(items.into_iter().filter(|item: &String| !item.trim().is_empty()).collect())
}

/// Numeric score. Accepts numbers, numeric strings and percentages (`"80%"` is 0.8).
pub fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(raw) => parse_score(&raw),
        _ => None,
    })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_score(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok().map(|p| p / 100.0),
        None => raw.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Listing {
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
        #[serde(default, deserialize_with = "null_as_default")]
        tags: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "lenient_text")]
        note: Option<String>,
        #[serde(default, deserialize_with = "lenient_list")]
        items: Vec<String>,
        #[serde(default, deserialize_with = "lenient_score")]
        score: Option<f64>,
    }

    #[test]
    fn test_lenient_fields_absorb_wrong_shapes() {
        let loose: Loose =
            parse_object(r#"{"note": {"min": 1, "max": 2}, "items": 7, "score": [0.5]}"#).unwrap();
        assert!(loose.note.is_none());
        assert!(loose.items.is_empty());
        assert!(loose.score.is_none());
    }

    #[test]
    fn test_lenient_fields_coerce_scalars() {
        let loose: Loose =
            parse_object(r#"{"note": 120000, "items": "Go, Rust;\nSQL, ", "score": "80%"}"#).unwrap();
        assert_eq!(loose.note.as_deref(), Some("120000"));
        assert_eq!(loose.items, vec!["Go", "Rust", "SQL"]);
        assert!((loose.score.unwrap() - 0.8).abs() < 1e-9);

        let loose: Loose = parse_object(r#"{"items": ["a", 2, null, {"x": 1}, " "], "score": " 0.25 "}"#).unwrap();
        assert_eq!(loose.items, vec!["a", "2"]);
        assert_eq!(loose.score, Some(0.25));
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_object_with_surrounding_prose() {
        let text = "Sure! Here is the result:\n{\"name\": \"Acme\", \"tags\": [\"a\"]}\nHope this helps.";
        let listing: Listing = parse_object(text).unwrap();
        assert_eq!(listing.name, "Acme");
        assert_eq!(listing.tags, vec!["a"]);
    }

    #[test]
    fn test_parse_object_treats_null_as_default() {
        let listing: Listing = parse_object(r#"{"name": null, "tags": null}"#).unwrap();
        assert!(listing.name.is_empty());
        assert!(listing.tags.is_empty());
    }

    #[test]
    fn test_parse_object_rejects_plain_prose() {
        let err = parse_object::<Listing>("I could not analyze this resume.").unwrap_err();
        assert!(matches!(err, StructuredOutputError::NoJson));
    }

    #[test]
    fn test_parse_object_rejects_arrays() {
        let err = parse_object::<Listing>("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, StructuredOutputError::NotAnObject("an array")));
    }

    #[test]
    fn test_parse_object_rejects_empty_text() {
        let err = parse_object::<Listing>("```json\n```").unwrap_err();
        assert!(matches!(err, StructuredOutputError::Empty));
    }

    #[test]
    fn test_parse_object_reports_shape_mismatch() {
        let err = parse_object::<Listing>(r#"{"name": 42}"#).unwrap_err();
        assert!(matches!(err, StructuredOutputError::Shape(_)));
    }
}
