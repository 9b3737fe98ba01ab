use crate::Format;
use crate::workspace::Location;
use colored::Colorize;
use ibmform_provider::ResourceStatus;

pub async fn list(location: &Location) -> anyhow::Result<()> {
    let state = location.state_manager().load().await?;
    if state.resources.is_empty() {
        println!("{}", "No resources in state".dimmed());
        return Ok(());
    }

    for (address, resource) in &state.resources {
        let status = match resource.status {
            ResourceStatus::Ready => "ready".green(),
            ResourceStatus::Tainted => "tainted".red(),
            ResourceStatus::Unknown => "unknown".yellow(),
        };
        println!("{}  {}  {}", address.cyan(), resource.id.dimmed(), status);
    }
    println!();
    println!("{} resource(s), serial {}", state.resources.len(), state.serial);
    Ok(())
}

pub async fn show(location: &Location, address: &str, format: Format) -> anyhow::Result<()> {
    let state = location.state_manager().load().await?;
    let resource = state
        .get_resource(address)
        .ok_or_else(|| anyhow::anyhow!("{} is not in state", address))?;

    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(resource)?,
        Format::Yaml => serde_yaml::to_string(resource)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
