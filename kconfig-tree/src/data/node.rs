use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::data::error::ModelError;

/// Kind of a configuration entry, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Bool,
    String,
    Int,
    Hex,
    /// Radio group; its children are the options.
    Choice,
    /// Grouping node. Carries a boolean of its own when `is_menuconfig`.
    Menu,
}

impl NodeKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Bool => "bool",
            NodeKind::String => "string",
            NodeKind::Int => "int",
            NodeKind::Hex => "hex",
            NodeKind::Choice => "choice",
            NodeKind::Menu => "menu",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive `[min, max]` bounds reported for numeric options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRange(pub i64, pub i64);

impl NodeRange {
    pub fn min(&self) -> i64 {
        self.0
    }

    pub fn max(&self) -> i64 {
        self.1
    }
}

/// Current value of a node.
///
/// Hex values keep the parsed number, so `0x03` and `0x3` are equal; they are
/// rendered back as `0x`-prefixed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeValue {
    #[default]
    Unset,
    Bool(bool),
    Str(String),
    Int(i64),
    Hex(u64),
}

impl NodeValue {
    /// Convert a value reported by the backend for an option of `kind`.
    pub fn from_json(kind: NodeKind, value: &Value, name: &str) -> Result<Self, ModelError> {
        if value.is_null() {
            return Ok(NodeValue::Unset);
        }
        let converted = match kind {
            NodeKind::Bool | NodeKind::Menu => value.as_bool().map(NodeValue::Bool),
            NodeKind::String | NodeKind::Choice => {
                value.as_str().map(|s| NodeValue::Str(s.to_string()))
            }
            NodeKind::Int => match value {
                Value::Number(n) => n.as_i64().map(NodeValue::Int),
                Value::String(s) => s.trim().parse().ok().map(NodeValue::Int),
                _ => None,
            },
            NodeKind::Hex => match value {
                Value::Number(n) => n.as_u64().map(NodeValue::Hex),
                Value::String(s) => parse_hex(s).map(NodeValue::Hex),
                _ => None,
            },
        };
        converted.ok_or_else(|| ModelError::TypeMismatch {
            name: name.to_string(),
            expected: kind.to_string(),
            actual: value.to_string(),
        })
    }

    /// Parse user-entered text for an option of `kind`.
    ///
    /// Booleans accept `y/n`, `true/false` and `1/0`; hex accepts digits with
    /// or without a `0x` prefix; a choice takes the name of the option to
    /// select.
    pub fn parse(kind: NodeKind, text: &str, name: &str) -> Result<Self, ModelError> {
        let trimmed = text.trim();
        let parsed = match kind {
            NodeKind::Bool | NodeKind::Menu => match trimmed.to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" | "1" => Some(NodeValue::Bool(true)),
                "n" | "no" | "false" | "0" => Some(NodeValue::Bool(false)),
                _ => None,
            },
            NodeKind::String => Some(NodeValue::Str(text.to_string())),
            NodeKind::Choice => (!trimmed.is_empty()).then(|| NodeValue::Str(trimmed.to_string())),
            NodeKind::Int => trimmed.parse().ok().map(NodeValue::Int),
            NodeKind::Hex => parse_hex(trimmed).map(NodeValue::Hex),
        };
        parsed.ok_or_else(|| ModelError::TypeMismatch {
            name: name.to_string(),
            expected: kind.to_string(),
            actual: text.to_string(),
        })
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, NodeValue::Unset)
    }

    /// JSON form of the value; hex is rendered as text.
    pub fn as_json(&self) -> Value {
        match self {
            NodeValue::Unset => Value::Null,
            NodeValue::Bool(b) => Value::Bool(*b),
            NodeValue::Str(s) => Value::String(s.clone()),
            NodeValue::Int(i) => Value::from(*i),
            NodeValue::Hex(h) => Value::String(format!("{h:#x}")),
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Unset => Ok(()),
            NodeValue::Bool(b) => write!(f, "{}", if *b { "y" } else { "n" }),
            NodeValue::Str(s) => f.write_str(s),
            NodeValue::Int(i) => write!(f, "{i}"),
            NodeValue::Hex(h) => write!(f, "{h:#x}"),
        }
    }
}

impl Serialize for NodeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_json().serialize(serializer)
    }
}

/// Parse hexadecimal text with an optional `0x`/`0X` prefix.
pub fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// One configuration entry or grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigNode {
    /// Stable backend identifier, unique within a tree.
    pub id: String,
    /// Symbol name used for value and range lookups. Empty for plain menus.
    pub name: String,
    pub kind: NodeKind,
    pub title: String,
    /// Display-ready help text.
    pub help: String,
    pub value: NodeValue,
    pub visible: bool,
    pub range: Option<NodeRange>,
    /// Raw dependency expression, for display only.
    pub depends_on: Option<String>,
    pub is_menuconfig: bool,
    pub children: Vec<ConfigNode>,
}

impl ConfigNode {
    /// Create a node with empty dynamic state.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            title: String::new(),
            help: String::new(),
            value: NodeValue::Unset,
            visible: false,
            range: None,
            depends_on: None,
            is_menuconfig: false,
            children: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: NodeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ConfigNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Whether the node has a value a user can edit.
    pub fn is_editable(&self) -> bool {
        !matches!(self.kind, NodeKind::Menu) || self.is_menuconfig
    }

    /// Label shown for the node: the title, falling back to the name.
    pub fn label(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    /// Depth-first iterator over this node and its descendants.
    pub fn iter(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Depth-first, pre-order iterator over a forest.
pub struct Walk<'a> {
    stack: Vec<&'a ConfigNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a ConfigNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Iterate every node of a forest in display order.
pub fn walk(nodes: &[ConfigNode]) -> Walk<'_> {
    Walk {
        stack: nodes.iter().rev().collect(),
    }
}

pub fn find_by_id<'a>(nodes: &'a [ConfigNode], id: &str) -> Option<&'a ConfigNode> {
    walk(nodes).find(|node| node.id == id)
}

pub fn find_by_name<'a>(nodes: &'a [ConfigNode], name: &str) -> Option<&'a ConfigNode> {
    if name.is_empty() {
        return None;
    }
    walk(nodes).find(|node| node.name == name)
}
