//! Option tree data structures.
//!
//! ## Architecture
//!
//! - [`node`] - Tree nodes, kinds and typed values
//! - [`snapshot`] - State snapshots reported by the backend
//! - [`merge`] - Applying a snapshot onto a tree
//! - [`loader`] - Building a tree from the backend's structure description
//! - [`error`] - Model errors

/// Model errors.
pub mod error;

/// Structure loading from `kconfig_menus.json`.
pub mod loader;

/// Snapshot merging.
pub mod merge;

/// Tree nodes and values.
pub mod node;

/// Backend state snapshots.
pub mod snapshot;

pub use error::ModelError;
pub use loader::{load_menus, parse_menus};
pub use merge::merge;
pub use node::{ConfigNode, NodeKind, NodeRange, NodeValue, find_by_id, find_by_name, walk};
pub use snapshot::Envelope;
