//! Policy CLI
//!
//! Proposes the changes needed to bring the system in line with its policy
//! documents, lets the administrator review them, applies the accepted ones
//! and records the result as the new state.

mod cli;
mod commands;
mod error;
mod interactive;

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use policy_core::{Engine, MainConfig};
use policy_modules::{SystemRunner, builtin_registry};
use tracing_subscriber::EnvFilter;

use cli::{Cli, RunMode};
use commands::ReviewOptions;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mode = cli.mode().ok_or(CliError::NoRunMode)?;

    let config_path = MainConfig::locate(cli.config.as_deref())?;
    tracing::debug!(config = %config_path, "Loading configuration");
    let config = MainConfig::load(&config_path)?;
    let registry = builtin_registry(&config, Arc::new(SystemRunner))?;
    let mut engine = Engine::open(&config, registry)?;

    execute_mode(&engine, &mode, &cli)?;
    commands::review_and_apply(
        &engine,
        ReviewOptions {
            pretend: cli.pretend,
            yes: cli.yes,
        },
    )?;

    engine.shutdown();
    Ok(())
}

fn execute_mode(engine: &Engine, mode: &RunMode, cli: &Cli) -> Result<()> {
    match mode {
        RunMode::Update => commands::run_update(engine, false),
        RunMode::Deploy => commands::run_update(engine, true),
        RunMode::AddUser(user) => commands::run_add_user(engine, user, &cli.account),
        RunMode::ModUser(user) => commands::run_mod_user(engine, user, &cli.account),
        RunMode::DelUser(user) => commands::run_del_user(engine, user, &cli.account),
        RunMode::AddGroup(group) => commands::run_add_group(engine, group),
        RunMode::DelGroup(group) => commands::run_del_group(engine, group),
    }
}
