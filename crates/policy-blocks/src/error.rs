//! Error types for policy-blocks

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Filesystem error: {0}")]
    Fs(#[from] policy_fs::Error),

    #[error("Invalid placement pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Fragment not found: {tag}")]
    FragmentNotFound { tag: String },
}
