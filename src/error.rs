use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DaoError>;

/// Errors raised by the data-access layer. Nothing is retried; the first
/// failure aborts the load or build step that hit it.
#[derive(Debug, Error)]
pub enum DaoError {
    #[error("{name} missing or empty: {}", path.display())]
    MissingFile { name: String, path: PathBuf },

    #[error("storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("conflicting schema in {}: {source}", path.display())]
    SchemaConflict {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("corrupt artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("cannot encode artifact {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid tensor: {0}")]
    InvalidTensor(String),

    #[error("plot failed: {0}")]
    Plot(String),
}

impl DaoError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
