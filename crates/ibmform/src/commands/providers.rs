use crate::workspace;
use colored::Colorize;

pub fn handle() -> anyhow::Result<()> {
    let registry = workspace::offline_registry()?;

    println!("{} {}", "Provider:".bold(), "ibm".cyan());
    println!();
    let resources = registry.resource_types();
    println!("Resources ({}):", resources.len());
    for name in resources {
        println!("  - {}", name.cyan());
    }
    println!();
    let data_sources = registry.data_source_types();
    println!("Data sources ({}):", data_sources.len());
    for name in data_sources {
        println!("  - {}", name.cyan());
    }
    Ok(())
}
