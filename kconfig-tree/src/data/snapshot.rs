use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::data::node::NodeRange;

/// One state snapshot reported by the backend.
///
/// Keys follow the backend's convention, which is asymmetric: `values` and
/// `ranges` are keyed by symbol name, `visible` by node id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub values: HashMap<String, Value>,
    #[serde(default)]
    pub visible: HashMap<String, bool>,
    #[serde(default)]
    pub ranges: HashMap<String, NodeRange>,
    /// Either a string or a list of strings.
    #[serde(default)]
    pub error: Option<Value>,
}

impl Envelope {
    /// The backend-reported error, if the envelope carries a non-empty one.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) if !items.is_empty() => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Value::String(_) | Value::Array(_) | Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether the snapshot carries no value updates.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
