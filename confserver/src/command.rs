use std::path::{Path, PathBuf};

use kconfig_tree::{
    ConfigNode, NodeKind, NodeValue,
    data::node::parse_hex,
};
use serde_json::Value;
use thiserror::Error;

/// Protocol version sent with every command.
pub const PROTOCOL_VERSION: u32 = 2;

/// Errors raised while encoding an edit.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value does not fit the option's kind.
    #[error("cannot set {kind} option `{id}` to `{value}`")]
    InvalidValue {
        id: String,
        kind: NodeKind,
        value: String,
    },
}

/// One command line written to the backend's stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Set a single symbol.
    Set { key: String, value: Value },
    /// Persist the backend's current values to a file.
    Save(PathBuf),
    /// Discard in-backend edits and re-read a file.
    Load(PathBuf),
}

impl Request {
    /// Encode an edit of `node` to `value`.
    ///
    /// A choice is set by turning the chosen option on, never by assigning
    /// the group: pass the option name, or `Bool(true)` on the option node.
    /// String and hex values are sent quoted, everything else raw.
    pub fn set(node: &ConfigNode, value: &NodeValue) -> Result<Self, EncodeError> {
        let invalid = || EncodeError::InvalidValue {
            id: node.id.clone(),
            kind: node.kind,
            value: format!("{value:?}"),
        };

        let (key, value) = match node.kind {
            NodeKind::Choice => match value {
                NodeValue::Str(option) if !option.is_empty() => (option.clone(), Value::Bool(true)),
                NodeValue::Bool(true) => (node.name.clone(), Value::Bool(true)),
                _ => return Err(invalid()),
            },
            NodeKind::String => match value {
                NodeValue::Str(s) => (node.id.clone(), Value::String(s.clone())),
                NodeValue::Unset => (node.id.clone(), Value::String(String::new())),
                _ => return Err(invalid()),
            },
            NodeKind::Hex => {
                let text = match value {
                    NodeValue::Hex(h) => format!("{h:#x}"),
                    NodeValue::Str(s) if parse_hex(s).is_some() => s.trim().to_string(),
                    NodeValue::Str(s) if s.trim().is_empty() => "0".to_string(),
                    NodeValue::Unset => "0".to_string(),
                    _ => return Err(invalid()),
                };
                (node.id.clone(), Value::String(text))
            }
            NodeKind::Int => {
                let number = match value {
                    NodeValue::Int(i) => *i,
                    NodeValue::Str(s) => s.trim().parse().map_err(|_| invalid())?,
                    NodeValue::Unset => node.range.map(|r| r.min()).unwrap_or(0),
                    _ => return Err(invalid()),
                };
                (node.id.clone(), Value::from(number))
            }
            NodeKind::Bool | NodeKind::Menu => match value {
                NodeValue::Bool(b) => (node.id.clone(), Value::Bool(*b)),
                _ => return Err(invalid()),
            },
        };
        Ok(Request::Set { key, value })
    }

    pub fn save(path: impl AsRef<Path>) -> Self {
        Request::Save(path.as_ref().to_path_buf())
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        Request::Load(path.as_ref().to_path_buf())
    }

    /// The newline-terminated command text.
    pub fn to_line(&self) -> String {
        let body = match self {
            Request::Set { key, value } => {
                format!(r#""set": {{{}: {}}}"#, json_string(key), value)
            }
            Request::Save(path) => format!(r#""save": {}"#, json_path(path)),
            Request::Load(path) => format!(r#""load": {}"#, json_path(path)),
        };
        let line = format!("{{\"version\": {PROTOCOL_VERSION}, {body}}}\n");
        debug!("confserver <- {}", line.trim_end());
        line
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn json_path(path: &Path) -> String {
    json_string(&path.to_string_lossy())
}
