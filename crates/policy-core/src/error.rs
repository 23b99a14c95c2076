//! Error types for policy-core

use std::path::PathBuf;

/// Result type for policy-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in policy-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A required configuration key is absent
    #[error("Missing required configuration key '{key}'")]
    MissingConfigKey { key: String },

    /// Configuration present but malformed
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Two modules claim the same (policy type, attribute) pair
    #[error(
        "Handler has already been set for policy '{policy_type}' attribute '{attribute}' (claimed by '{existing}')"
    )]
    HandlerConflict {
        policy_type: String,
        attribute: String,
        existing: String,
    },

    /// A module with this name is already bound
    #[error("Module '{name}' has already been registered")]
    ModuleAlreadyRegistered { name: String },

    /// No policy of this type is loaded
    #[error("Unknown policy: {name}")]
    UnknownPolicy { name: String },

    /// No changeset with this identity is known to the engine
    #[error("Unknown changeset: {id}")]
    UnknownChangeSet { id: uuid::Uuid },

    /// An event hook failed while extending a changeset
    #[error("Event hook '{module}' failed on {event}: {source}")]
    Hook {
        event: String,
        module: String,
        #[source]
        source: ExecutionError,
    },

    /// A tree store was asked to persist without a backing location
    #[error("Document '{name}' has no backing source")]
    NoSource { name: String },

    /// The background worker could not be started or has stopped
    #[error("Worker stopped: {message}")]
    WorkerStopped { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from policy-fs
    #[error(transparent)]
    Fs(#[from] policy_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON conversion error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is an I/O failure reading or writing a document.
    ///
    /// Parse errors are not I/O failures.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Fs(policy_fs::Error::Io { .. }))
    }
}

/// Errors raised by a module while performing a change.
///
/// The worker converts every one of these into a FAILED change.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A change parameter is missing or has the wrong shape
    #[error("Missing or invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The change refers to a policy that is not loaded
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Filesystem error from policy-fs
    #[error(transparent)]
    Fs(#[from] policy_fs::Error),

    /// Module-specific failure
    #[error("{module}: {source}")]
    Module {
        module: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ExecutionError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn module(
        module: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Module {
            module: module.into(),
            source: source.into(),
        }
    }
}
