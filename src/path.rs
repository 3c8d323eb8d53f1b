// src/path.rs

use serde_json::Value;
use thiserror::Error;

/// A dotted path could not be walked to the end.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot resolve `{path}`: no `{segment}` on {found}")]
pub struct PathError {
    pub path: String,
    pub segment: String,
    pub found: &'static str,
}

/// Walk `path` (e.g. `"customer_client.id"`) against `value`.
///
/// Each segment matches an object key as written or in lowerCamelCase, since
/// the REST wire format camel-cases field names that queries spell in
/// snake_case. A numeric segment indexes into an array.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    let mut current = value;
    for segment in path.split('.') {
        current = step(current, segment).ok_or_else(|| PathError {
            path: path.to_string(),
            segment: segment.to_string(),
            found: kind(current),
        })?;
    }
    Ok(current)
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(segment)
            .or_else(|| map.get(&lower_camel(segment))),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// `descriptive_name` → `descriptiveName`
pub fn lower_camel(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper = false;
    for c in segment.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_snake_case_against_camel_case_keys() {
        let row = json!({"customerClient": {"descriptiveName": "Shop", "id": "42"}});
        assert_eq!(
            resolve(&row, "customer_client.descriptive_name").unwrap(),
            &json!("Shop")
        );
        assert_eq!(resolve(&row, "customerClient.id").unwrap(), &json!("42"));
    }

    #[test]
    fn numeric_segment_indexes_arrays() {
        let v = json!({"urls": [{"text": "a"}, {"text": "b"}]});
        assert_eq!(resolve(&v, "urls.1.text").unwrap(), &json!("b"));
    }

    #[test]
    fn missing_segment_reports_where_it_stopped() {
        let v = json!({"inner": 3});
        let err = resolve(&v, "inner.value").unwrap_err();
        assert_eq!(err.segment, "value");
        assert_eq!(err.found, "number");
    }

    #[test]
    fn lower_camel_leaves_plain_names_alone() {
        assert_eq!(lower_camel("id"), "id");
        assert_eq!(lower_camel("final_url_suffix"), "finalUrlSuffix");
    }
}
