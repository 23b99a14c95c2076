//! Error types for policy-fs

use crate::document::DocumentFormat;
use std::path::PathBuf;

/// Result type for policy-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or replacing documents
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document text is not valid in its format
    #[error("{path} is not a valid {format} document: {message}")]
    Parse {
        path: PathBuf,
        format: DocumentFormat,
        message: String,
    },

    /// The value cannot be expressed in the document's format
    #[error("Cannot write {path} as {format}: {message}")]
    Render {
        path: PathBuf,
        format: DocumentFormat,
        message: String,
    },

    #[error("No document format for extension '{extension}'")]
    UnsupportedFormat { extension: String },

    /// Another writer holds the document
    #[error("Cannot lock {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
