use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building or updating the option tree.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A value does not fit the kind of the option it targets.
    #[error("type mismatch at `{name}`: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    /// Two nodes of one structure share an id.
    #[error("duplicate option id `{0}`")]
    DuplicateId(String),
    /// The structure description is not valid JSON.
    #[error("invalid menu structure: {0}")]
    Json(#[from] serde_json::Error),
    /// The structure description could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
