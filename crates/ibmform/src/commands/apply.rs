use crate::commands::plan;
use crate::output;
use crate::workspace::Workspace;
use colored::Colorize;

pub async fn handle(ws: &Workspace, yes: bool, refresh: bool) -> anyhow::Result<()> {
    let engine = ws.engine()?;
    let mut lock = engine.lock().await?;
    let (mut state, plan) = plan::prepare(ws, &engine, refresh).await?;
    output::print_plan(&plan, engine.registry());

    if !plan.has_changes {
        return Ok(());
    }
    if !yes {
        println!();
        println!("{}", "Nothing was changed.".yellow());
        println!("Run again with --yes to apply this plan");
        return Ok(());
    }

    println!();
    println!("{}", "Applying...".blue());
    let result = engine.apply(&ws.manifest, &plan, &mut state, &mut lock).await?;
    lock.release().await?;
    output::print_apply_result(&result);

    if !result.is_success() {
        anyhow::bail!("apply did not complete; state records what was done");
    }
    Ok(())
}
