//! Built-in system handlers for the policy reconciler
//!
//! - [`shadow`]: user and group accounts (`groups` policy)
//! - [`pam`]: service access rules written as tagged PAM fragments
//!   (`services` policy)
//! - [`quota`]: user and group disk quotas (`groups` policy)
//!
//! Modules that run system utilities do so through a [`CommandRunner`].

pub mod error;
mod params;
pub mod pam;
pub mod quota;
pub mod runner;
pub mod shadow;
pub mod units;

pub use error::{Error, Result};
pub use pam::{AccessRule, PamModule};
pub use quota::{QuotaLimits, QuotaModule};
pub use runner::{
    CommandOutput, CommandRunner, RecordedCommand, RecordingRunner, SharedRunner, SystemRunner,
    run_checked,
};
pub use shadow::{PasswordPolicy, ShadowModule, UserRequest};
pub use units::{parse_size, parse_size_value};

use policy_core::{MainConfig, Module, ModuleRegistry};

/// Every built-in module, configured from `config`.
pub fn builtin_modules(config: &MainConfig, runner: SharedRunner) -> Vec<Box<dyn Module>> {
    vec![
        Box::new(ShadowModule::new(runner.clone())),
        Box::new(PamModule::from_config(config)),
        Box::new(QuotaModule::from_config(config, runner)),
    ]
}

/// A registry holding every built-in module.
pub fn builtin_registry(
    config: &MainConfig,
    runner: SharedRunner,
) -> policy_core::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    for module in builtin_modules(config, runner) {
        registry.register(module)?;
    }
    Ok(registry)
}
