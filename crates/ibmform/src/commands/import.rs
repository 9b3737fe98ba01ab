use crate::workspace::Workspace;
use colored::Colorize;

pub async fn handle(ws: &Workspace, address: &str, id: &str) -> anyhow::Result<()> {
    let engine = ws.engine()?;
    let mut lock = engine.lock().await?;
    let mut state = engine.load_state().await?;

    println!("Importing {} as {}...", id.cyan(), address.cyan());
    let entry = engine
        .import(&ws.manifest, address, id, &mut state, &mut lock)
        .await?;
    lock.release().await?;

    println!("{}", format!("✓ Imported {}", address).green().bold());
    println!("  id: {}", entry.id);
    println!("  attributes: {}", entry.attributes.len());
    println!();
    println!("Run `ibmform plan` to compare it with the manifest");
    Ok(())
}
