//! Interactive prompts for CLI commands
//!
//! Uses dialoguer for terminal-based confirmation and password entry.

use colored::Colorize;
use dialoguer::{Confirm, Password};
use policy_modules::PasswordPolicy;

use crate::error::Result;

/// Ask a yes/no question.
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// Prompt for a new password until one satisfies `policy`.
pub fn new_password(username: &str, policy: &PasswordPolicy) -> Result<String> {
    loop {
        let password = Password::new()
            .with_prompt(format!("Password for {username}"))
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()?;
        match policy.check(&password) {
            Ok(()) => return Ok(password),
            Err(e) => eprintln!("{}: {}", "warning".yellow().bold(), e),
        }
    }
}
