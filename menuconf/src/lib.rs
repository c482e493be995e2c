//! # menuconf
//!
//! Editor core for Kconfig projects whose configuration is evaluated by an
//! external confserver backend.
//!
//! `menuconf` never evaluates Kconfig itself. It owns the backend process,
//! keeps an option tree in sync with the snapshots the backend reports and
//! forwards edits, saves and reloads to it.
//!
//! ## Modules
//!
//! - [`session`] - Backend process driver and option tree synchronization
//! - [`host`] - Single live session per workspace
//! - [`dirty`] - Saved/unsaved tracking
//! - [`listener`] - Notifications for tree updates and protocol errors
//! - [`config`] - `.menuconfig.toml` loading and placeholder expansion
//! - [`utils`] - Process specs and placeholder helpers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::{path::Path, sync::Arc};
//!
//! use menuconf::{config::MenuconfigConfig, host::SessionHost, listener::SessionEvent};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let workspace = Path::new("/work/blink");
//! let config = MenuconfigConfig::load(&workspace.join(".menuconfig.toml"))?
//!     .resolve(workspace)?;
//!
//! let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
//! let host = SessionHost::new();
//! let session = host.init(&config, Arc::new(tx)).await?;
//! session.set_value_by_name("LOG_DEFAULT_LEVEL_DEBUG", "y")?;
//! session.save()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

/// Configuration file handling.
pub mod config;

/// Saved/unsaved state of a session.
pub mod dirty;

/// Session errors.
pub mod error;

/// Session ownership.
pub mod host;

/// Session notifications.
pub mod listener;

/// Backend process driver.
///
/// Spawns or attaches to a confserver backend, frames its snapshots, merges
/// them into the option tree and forwards commands in order.
pub mod session;

/// Common utilities and helper functions.
pub mod utils;

mod defaults;

pub use defaults::Progress;
pub use dirty::DirtyState;
pub use error::SessionError;
pub use listener::{SessionEvent, SessionListener};
pub use session::{Session, SessionOptions, StructureSource};
