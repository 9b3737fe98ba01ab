use crate::output;
use crate::workspace::Workspace;
use colored::Colorize;
use ibmform_core::Engine;
use ibmform_provider::{GlobalState, Plan};

/// Validate, optionally refresh, and plan
///
/// Shared by `plan` and `apply`. Callers hold the state lock so the state
/// read here is still current when the plan is applied.
pub async fn prepare(ws: &Workspace, engine: &Engine, refresh: bool) -> anyhow::Result<(GlobalState, Plan)> {
    let diagnostics = engine.validate(&ws.manifest)?;
    if diagnostics.iter().any(|d| d.is_error()) {
        output::print_diagnostics(&diagnostics);
        anyhow::bail!("manifest is invalid; run `ibmform validate` for details");
    }

    let mut state = engine.load_state().await?;
    if refresh && !state.resources.is_empty() {
        println!("{}", "Refreshing state...".blue());
        for address in engine.refresh(&mut state).await? {
            println!("  {} {} no longer exists", "!".yellow(), address.cyan());
        }
    }

    let plan = engine.plan(&ws.manifest, &state).await?;
    Ok((state, plan))
}

pub async fn handle(ws: &Workspace, refresh: bool) -> anyhow::Result<()> {
    let engine = ws.engine()?;
    let lock = engine.lock().await?;
    let (_, plan) = prepare(ws, &engine, refresh).await?;
    lock.release().await?;
    output::print_plan(&plan, engine.registry());
    Ok(())
}
