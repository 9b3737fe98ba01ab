use crate::output;
use crate::workspace::Workspace;
use colored::Colorize;

pub async fn handle(ws: &Workspace, yes: bool) -> anyhow::Result<()> {
    let engine = ws.engine()?;
    let mut lock = engine.lock().await?;
    let mut state = engine.load_state().await?;
    if state.resources.is_empty() {
        println!("{}", "No resources in state, nothing to destroy.".dimmed());
        return Ok(());
    }

    let plan = engine.plan_destroy(&state)?;
    output::print_plan(&plan, engine.registry());

    if !yes {
        println!();
        println!(
            "{}",
            format!("Warning: {} resource(s) will be deleted permanently.", plan.actions.len()).yellow()
        );
        println!("Run again with --yes to destroy them");
        return Ok(());
    }

    println!();
    println!("{}", "Destroying...".blue());
    let result = engine.destroy(&ws.manifest, &mut state, &mut lock).await?;
    lock.release().await?;
    output::print_apply_result(&result);

    if !result.is_success() {
        anyhow::bail!("{} resource(s) remain in state", state.resources.len());
    }
    Ok(())
}
