//! Update and deploy modes

use policy_core::Engine;

use crate::error::Result;

/// Propose changesets for every policy difference.
///
/// Deploy mode forgets the recorded state first, so the whole policy is
/// proposed again. Changesets that only track state are accepted.
pub fn run_update(engine: &Engine, deploy: bool) -> Result<()> {
    if deploy {
        tracing::info!("Deploying the whole policy");
        engine.clear_state();
    }
    let proposed = engine.get_policy_updates()?;
    let accepted = engine.accept_state_changes();
    tracing::debug!(proposed = proposed.len(), accepted, "Collected policy updates");
    Ok(())
}
