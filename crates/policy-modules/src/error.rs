//! Error types for policy-modules

use policy_core::ExecutionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {status:?}: {stderr}")]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Missing or invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid size '{value}'")]
    InvalidSize { value: String },

    #[error("Password must be at least {min_length} characters long")]
    PasswordTooShort { min_length: usize },

    #[error("A user needs a primary group")]
    MissingGroup,

    /// Passwords are fed to `chpasswd` one `user:password` line at a time
    #[error("Password must not contain control characters")]
    PasswordControlCharacter,

    #[error("Fragment error: {0}")]
    Blocks(#[from] policy_blocks::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] policy_fs::Error),
}

impl Error {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Attribute this error to a module for the worker.
    pub fn in_module(self, module: &str) -> ExecutionError {
        match self {
            Self::InvalidParameter { name, reason } => ExecutionError::InvalidParameter { name, reason },
            Self::Fs(e) => ExecutionError::Fs(e),
            other => ExecutionError::module(module, other),
        }
    }
}
