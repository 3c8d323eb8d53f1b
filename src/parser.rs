// src/parser.rs

use serde_json::{Number, Value};

/// Turns a raw field value into its final form.
///
/// `None` means "nothing to do"; the caller keeps the value it passed in.
pub trait Parser {
    fn parse(&self, value: &Value) -> Option<Value>;
}

impl<F> Parser for F
where
    F: Fn(&Value) -> Option<Value>,
{
    fn parse(&self, value: &Value) -> Option<Value> {
        self(value)
    }
}

/// Leaves every value untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopParser;

impl Parser for NoopParser {
    fn parse(&self, _value: &Value) -> Option<Value> {
        None
    }
}

/// Undoes the REST encoding of int64 fields as JSON strings, and unwraps
/// wrapper messages such as `{"text": "..."}` or `{"url": "..."}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowParser;

impl Parser for RowParser {
    fn parse(&self, value: &Value) -> Option<Value> {
        match value {
            Value::String(s) => parse_int64(s).map(Value::Number),
            Value::Object(map) if map.len() == 1 => map
                .iter()
                .next()
                .filter(|(key, _)| WRAPPER_KEYS.contains(&key.as_str()))
                .map(|(_, inner)| self.parse(inner).unwrap_or_else(|| inner.clone())),
            Value::Array(items) => {
                let parsed: Vec<Option<Value>> = items.iter().map(|v| self.parse(v)).collect();
                if parsed.iter().all(Option::is_none) {
                    return None;
                }
                Some(Value::Array(
                    parsed
                        .into_iter()
                        .zip(items)
                        .map(|(p, raw)| p.unwrap_or_else(|| raw.clone()))
                        .collect(),
                ))
            }
            _ => None,
        }
    }
}

// single-field messages whose only job is to carry one value
const WRAPPER_KEYS: &[&str] = &["text", "url", "value"];

fn parse_int64(s: &str) -> Option<Number> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // keep ids with leading zeros as text
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    s.parse::<i64>().ok().map(Number::from)
}
