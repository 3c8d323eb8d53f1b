// src/customizer.rs

use crate::path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Per-position rule applied to a raw field value before it is parsed.
///
/// Serialized as `{"type": "nested_field", "value": "text"}` or
/// `{"type": "resource_index", "value": 1}`. Any other `type` is rejected
/// at deserialization time. A negative resource index counts from the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Customizer {
    NestedField(String),
    ResourceIndex(i64),
}

/// Zero-based field position → customizer.
pub type CustomizerTable = HashMap<usize, Customizer>;

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    /// The directive does not fit the shape of the value it was applied to.
    #[error("{customizer} is incorrect")]
    Customizer { customizer: Customizer },

    #[error("resource index {index} out of range for `{value}`")]
    ResourceIndex { index: i64, value: String },
}

impl fmt::Display for Customizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Customizer::NestedField(p) => write!(f, "nested_field({})", p),
            Customizer::ResourceIndex(i) => write!(f, "resource_index({})", i),
        }
    }
}

impl Customizer {
    /// A `null` value (a field the API left out) passes through untouched.
    pub fn apply(&self, value: Value) -> Result<Value, RowError> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            Customizer::NestedField(field) => path::resolve(&value, field)
                .map(Clone::clone)
                .map_err(|_| RowError::Customizer {
                    customizer: self.clone(),
                }),
            Customizer::ResourceIndex(index) => {
                let text = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let parts: Vec<&str> = text.split('~').collect();
                let pos = if *index < 0 {
                    usize::try_from(parts.len() as i64 + *index).ok()
                } else {
                    usize::try_from(*index).ok()
                };
                pos.and_then(|p| parts.get(p))
                    .map(|part| Value::String(part.to_string()))
                    .ok_or(RowError::ResourceIndex {
                        index: *index,
                        value: text.clone(),
                    })
            }
        }
    }
}
