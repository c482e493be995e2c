//! # confserver
//!
//! Wire handling for the Kconfig configuration server protocol.
//!
//! The backend is a long-running process that owns all Kconfig evaluation. It
//! reads one JSON command per line on stdin and answers with JSON state
//! snapshots on stdout. There are no request ids: each snapshot reflects the
//! cumulative effect of everything written so far.
//!
//! This crate contains the two pure halves of that conversation:
//!
//! - [`framer`] - Extracting complete snapshots from an unstructured byte stream
//! - [`command`] - Encoding edits, saves and loads as command lines
//!
//! ## Quick Start
//!
//! ```rust
//! use confserver::{Framer, Request};
//! use kconfig_tree::{ConfigNode, NodeKind, NodeValue};
//!
//! let mut framer = Framer::new();
//! assert!(framer.feed(br#"{"values": {"FOO": true}, "visible": {},"#).is_none());
//! let envelope = framer.feed(br#" "ranges": {}}"#).unwrap().unwrap();
//! assert_eq!(envelope.values["FOO"], true);
//!
//! let node = ConfigNode::new("FOO", "FOO", NodeKind::Bool);
//! let line = Request::set(&node, &NodeValue::Bool(false)).unwrap().to_line();
//! assert_eq!(line, "{\"version\": 2, \"set\": {\"FOO\": false}}\n");
//! ```

#[macro_use]
extern crate log;

/// Command encoding.
pub mod command;

/// Snapshot framing.
pub mod framer;

pub use command::{EncodeError, PROTOCOL_VERSION, Request};
pub use framer::{FrameError, Framer};
pub use kconfig_tree::Envelope;
