//! Error types for the policy binary

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Why a `policy` run stopped
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Loading, proposing or persisting failed in the engine
    #[error(transparent)]
    Engine(#[from] policy_core::Error),

    /// An account request was rejected before it was proposed
    #[error(transparent)]
    Account(#[from] policy_modules::Error),

    #[error("Cannot display changeset: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("No run mode selected")]
    NoRunMode,
}
