//! Tagged fragment management for system configuration files.
//!
//! Handlers that edit shared configuration files (PAM stacks, login
//! defaults) never rewrite the whole file. They own fragments delimited by
//! tag markers:
//!
//! ```text
//! ### BEGIN policy module pam -- groups_allow ###
//! account required pam_succeed_if.so quiet user ingroup admins
//! ### END policy module pam -- groups_allow ###
//! ```
//!
//! Writing a fragment always replaces any earlier fragment with the same
//! tag, so re-applying the same policy is idempotent. Placement is relative
//! to the first line matching a pattern, or at the end of the file.

pub mod error;
pub mod file;
pub mod parser;
pub mod writer;

pub use error::{Error, Result};
pub use file::{remove_fragment_from_file, upsert_fragment_in_file};
pub use parser::{Fragment, FragmentTag, find_fragment, has_fragment, parse_fragments};
pub use writer::{Placement, remove_fragment, strip_fragment, upsert_fragment};
