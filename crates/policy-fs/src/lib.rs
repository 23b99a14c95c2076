//! Filesystem layer for the policy reconciler
//!
//! Provides normalized paths, atomic locked replacement of files and
//! format-detecting loading and saving of policy, state and configuration
//! documents.

pub mod document;
pub mod error;
pub mod io;
pub mod path;

pub use document::{DocumentFormat, load_document, save_document};
pub use error::{Error, Result};
pub use path::NormalizedPath;
