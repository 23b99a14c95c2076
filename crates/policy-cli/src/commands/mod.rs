//! Command implementations for policy-cli

pub mod account;
pub mod review;
pub mod update;

pub use account::{run_add_group, run_add_user, run_del_group, run_del_user, run_mod_user};
pub use review::{ReviewOptions, render_changeset, review_and_apply};
pub use update::run_update;
