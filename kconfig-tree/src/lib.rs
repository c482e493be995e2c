//! # kconfig-tree
//!
//! In-memory model of a Kconfig option tree whose values are owned by an
//! external evaluator.
//!
//! The tree structure (names, kinds, hierarchy, help text) is loaded once from
//! the JSON description the backend generates. After that, every state
//! snapshot the backend reports is merged in place: values, visibility and
//! numeric ranges are updated, and nothing is re-identified.
//!
//! ## Quick Start
//!
//! ```rust
//! use kconfig_tree::data::{ConfigNode, Envelope, NodeKind, NodeValue, merge};
//!
//! let mut tree = vec![ConfigNode::new("FOO", "FOO", NodeKind::Bool)];
//! let envelope: Envelope =
//!     serde_json::from_str(r#"{"values": {"FOO": true}, "visible": {"FOO": true}, "ranges": {}}"#)
//!         .unwrap();
//!
//! assert!(merge(&mut tree, &envelope));
//! assert_eq!(tree[0].value, NodeValue::Bool(true));
//! assert!(tree[0].visible);
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Tree nodes, snapshots, merging and structure loading
//! - [`help`] - Help text formatting

#[macro_use]
extern crate log;

/// Tree nodes, backend snapshots, merging and structure loading.
pub mod data;

/// Display formatting for raw Kconfig help text.
pub mod help;

pub use data::{ConfigNode, Envelope, ModelError, NodeKind, NodeRange, NodeValue, merge};
