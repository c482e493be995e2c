use std::{io, path::PathBuf};

use confserver::{EncodeError, FrameError};
use kconfig_tree::ModelError;
use thiserror::Error;

/// Errors raised by a backend session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend process could not be started.
    #[error("failed to spawn backend `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("backend process has no {0} pipe")]
    MissingPipe(&'static str),
    /// The backend exited unexpectedly.
    #[error("backend exited with {}", exit_label(.code))]
    BackendExited { code: Option<i32> },
    /// Reading or writing one of the backend streams failed.
    #[error("backend {stream} failed: {source}")]
    Stream {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Unexpected output on the backend's stderr.
    #[error("backend: {0}")]
    Stderr(String),
    /// The option structure could not be loaded.
    #[error("failed to load option structure: {0}")]
    Structure(#[source] ModelError),
    #[error(transparent)]
    InvalidValue(#[from] ModelError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    /// The session was disposed or the backend is gone.
    #[error("session is closed")]
    Closed,
    /// The backend went away before reporting its first snapshot.
    #[error("backend not ready: {0}")]
    NotReady(String),
    #[error("failed to spawn reconfigure command `{program}`: {source}")]
    ReconfigureSpawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The reconfigure command finished unsuccessfully.
    #[error("reconfigure command exited with {}", exit_label(.code))]
    Reconfigure { code: Option<i32> },
    #[error("failed to remove {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}
