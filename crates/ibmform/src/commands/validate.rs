use crate::output;
use crate::workspace::Workspace;
use colored::Colorize;

pub fn handle(ws: &Workspace) -> anyhow::Result<()> {
    println!("{}", "Validating manifest...".blue());
    println!("Manifest: {}", ws.manifest_path.display().to_string().cyan());

    let engine = ws.offline_engine()?;
    let diagnostics = engine.validate(&ws.manifest)?;
    output::print_diagnostics(&diagnostics);

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        eprintln!();
        eprintln!("{}", "✗ Manifest has errors".red().bold());
        anyhow::bail!("{} error(s) in {}", errors, ws.manifest_path.display());
    }

    println!("{}", "✓ Manifest is valid".green().bold());
    println!();
    println!("Summary:");
    if let Some(region) = ws.manifest.provider.as_ref().and_then(|p| p.get_str("region")) {
        println!("  Region: {}", region.cyan());
    }
    println!("  Variables: {}", ws.manifest.variables.len());
    println!("  Resources: {}", ws.manifest.resources().count());
    for node in ws.manifest.resources() {
        println!("    - {}", node.address().cyan());
    }
    println!("  Data sources: {}", ws.manifest.data_sources().count());
    for node in ws.manifest.data_sources() {
        println!("    - {}", node.address().cyan());
    }
    Ok(())
}
