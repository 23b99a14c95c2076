//! CLI argument parsing using clap derive

use clap::{ArgGroup, Args, Parser};
use std::path::PathBuf;

/// Policy - reconcile system configuration with declarative policy documents
#[derive(Parser, Debug)]
#[command(name = "policy")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["update", "deploy", "add_user", "mod_user", "del_user", "add_group", "del_group"])
))]
pub struct Cli {
    /// Main configuration file
    #[arg(short, long, env = "POLICY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Show proposed changes without applying them
    #[arg(short = 'P', long)]
    pub pretend: bool,

    /// Approve every proposed change without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Apply policy changes made since the last run
    #[arg(short, long)]
    pub update: bool,

    /// Apply the whole policy, ignoring the recorded state
    #[arg(long)]
    pub deploy: bool,

    /// Create a user account
    #[arg(long, visible_alias = "au", value_name = "USER")]
    pub add_user: Option<String>,

    /// Modify a user account
    #[arg(long, visible_alias = "mu", value_name = "USER")]
    pub mod_user: Option<String>,

    /// Delete a user account
    #[arg(long, visible_alias = "du", value_name = "USER")]
    pub del_user: Option<String>,

    /// Create a group
    #[arg(long, visible_alias = "ag", value_name = "GROUP")]
    pub add_group: Option<String>,

    /// Delete a group
    #[arg(long, visible_alias = "dg", value_name = "GROUP")]
    pub del_group: Option<String>,

    #[command(flatten)]
    pub account: AccountArgs,
}

/// Account settings for user operations; they override the group policy.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountArgs {
    /// Base directory for the home directory
    #[arg(short = 'b', long, value_name = "DIR")]
    pub base_dir: Option<String>,

    /// Real name of the user
    #[arg(short, long)]
    pub name: Option<String>,

    /// Home directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub home_dir: Option<String>,

    /// Days until the account expires
    #[arg(short, long, value_name = "DAYS")]
    pub expiredate: Option<i64>,

    /// Days after password expiry until the account is disabled
    #[arg(short, long, value_name = "DAYS")]
    pub inactive: Option<i64>,

    /// Group membership; the first group is the primary group
    #[arg(short, long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Skeleton directory
    #[arg(short = 'k', long, value_name = "DIR")]
    pub skel: Option<String>,

    /// Create the home directory
    #[arg(short = 'm', long, conflicts_with = "no_home")]
    pub create_home: bool,

    /// Do not create the home directory
    #[arg(short = 'N', long)]
    pub no_home: bool,

    /// Login shell
    #[arg(short, long)]
    pub shell: Option<String>,

    /// Prompt for a password
    #[arg(short, long)]
    pub password: bool,

    /// Remove the home directory when deleting a user
    #[arg(short, long)]
    pub remove_home: bool,
}

/// The selected run mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Update,
    Deploy,
    AddUser(String),
    ModUser(String),
    DelUser(String),
    AddGroup(String),
    DelGroup(String),
}

impl Cli {
    /// The run mode; the argument group guarantees exactly one is set.
    pub fn mode(&self) -> Option<RunMode> {
        if self.update {
            return Some(RunMode::Update);
        }
        if self.deploy {
            return Some(RunMode::Deploy);
        }
        self.add_user
            .clone()
            .map(RunMode::AddUser)
            .or_else(|| self.mod_user.clone().map(RunMode::ModUser))
            .or_else(|| self.del_user.clone().map(RunMode::DelUser))
            .or_else(|| self.add_group.clone().map(RunMode::AddGroup))
            .or_else(|| self.del_group.clone().map(RunMode::DelGroup))
    }
}
