//! Lenient field access over untyped LLM JSON.
//!
//! Every helper is total: wrong types and missing keys read as "absent"
//! instead of failing.

use serde_json::Value;

/// First alias whose value is present and not `null`.
pub fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// A sequence, or the values of a keyed mapping in their original order.
/// Anything else is empty.
pub fn sequence(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Scalar rendered as text. Objects, arrays and `null` read as empty.
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Trimmed text of the first present alias, empty when absent.
pub fn text_field(value: &Value, keys: &[&str]) -> String {
    first_present(value, keys)
        .map(|v| text(v).trim().to_string())
        .unwrap_or_default()
}

/// First alias holding a non-blank string (after trimming).
pub fn non_blank(value: &Value, keys: &[&str]) -> Option<String> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|k| object.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Integer coercion for indices: numbers are truncated, strings are parsed
/// from their leading integer (`" 3rd"` → 3). Non-finite or unparsable → `None`.
pub fn index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Strings of a sequence (or a single string); non-string items are skipped.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        _ => sequence(value)
            .into_iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
    }
}
