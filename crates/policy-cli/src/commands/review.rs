//! Review of proposed changesets, execution and state persistence

use colored::Colorize;
use policy_core::{ChangeSet, ChangeSetHandle, ChangeState, Engine};
use serde_json::Value;

use crate::error::Result;
use crate::interactive;

const REDACTED: &str = "********";

/// How proposed changesets are approved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewOptions {
    /// Only show what would be done
    pub pretend: bool,
    /// Approve everything without prompting
    pub yes: bool,
}

/// YAML for display, with passwords redacted.
pub fn render_changeset(changeset: &ChangeSet) -> Result<String> {
    let mut value = serde_json::to_value(changeset).map_err(policy_core::Error::from)?;
    if let Some(changes) = value.get_mut("changes").and_then(Value::as_array_mut) {
        for change in changes {
            if let Some(parameters) = change.get_mut("parameters").and_then(Value::as_object_mut)
                && let Some(password) = parameters.get_mut("password")
            {
                *password = Value::String(REDACTED.to_string());
            }
        }
    }
    Ok(serde_yaml::to_string(&value)?)
}

fn state_label(state: ChangeState) -> colored::ColoredString {
    let label = state.as_str();
    match state {
        ChangeState::Completed | ChangeState::NotHandled => label.green(),
        ChangeState::Failed => label.red().bold(),
        ChangeState::Rejected | ChangeState::Ignored => label.dimmed(),
        _ => label.yellow(),
    }
}

fn print_changeset(handle: &ChangeSetHandle) -> Result<()> {
    let snapshot = handle.snapshot();
    println!("{} {}", "Changeset".bold(), snapshot.id.to_string().cyan());
    print!("{}", render_changeset(&snapshot)?);
    println!();
    Ok(())
}

/// Show every pending changeset and let the administrator approve the
/// proposed ones. Already accepted changesets only track state.
fn approve(engine: &Engine, options: ReviewOptions) -> Result<()> {
    for handle in engine.changesets() {
        let state = handle.state();
        if !matches!(state, ChangeState::Proposed | ChangeState::Accepted) {
            continue;
        }
        print_changeset(&handle)?;
        if options.pretend || state == ChangeState::Accepted {
            continue;
        }
        let accepted = options.yes || interactive::confirm("Apply this changeset?", false)?;
        engine.accept_changeset(handle.id(), accepted)?;
    }
    Ok(())
}

/// Review every proposed changeset, run the accepted ones and persist state.
pub fn review_and_apply(engine: &Engine, options: ReviewOptions) -> Result<()> {
    approve(engine, options)?;
    if options.pretend {
        println!("{}", "Pretending, nothing was applied.".dimmed());
        return Ok(());
    }

    let accepted = engine.changesets_with_state(ChangeState::Accepted);
    if accepted.is_empty() {
        println!("{}", "Nothing to do.".green());
        return Ok(());
    }

    println!("{}", "Accepted changesets:".bold());
    for handle in &accepted {
        println!("  {} {}", handle.id().to_string().cyan(), handle.snapshot().summary());
    }
    if !options.yes && !interactive::confirm("Apply the accepted changesets?", true)? {
        println!("{}", "Aborted, nothing was applied.".yellow());
        return Ok(());
    }

    engine.enqueue_changesets(accepted.clone())?;
    engine.wait_idle();
    engine.save_state()?;

    println!();
    println!("{}", "Results:".bold());
    for handle in &accepted {
        println!(
            "  {} {} [{}]",
            handle.id().to_string().cyan(),
            handle.snapshot().summary(),
            state_label(handle.state())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::Change;
    use serde_json::json;

    #[test]
    fn passwords_are_redacted() {
        let changeset = ChangeSet::from(Change::with_params(
            "shadow",
            "set_password",
            json!({"username": "ann", "password": "hunter22"}),
        ));
        let rendered = render_changeset(&changeset).unwrap();
        assert!(rendered.contains(REDACTED));
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("set_password"));
    }
}
