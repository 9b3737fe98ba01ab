use crate::workspace::{self, Location};
use colored::Colorize;
use ibmform_client::Session;
use std::path::Path;

/// Uses the manifest's provider block when one can be found
pub async fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    let provider = match Location::find(file) {
        Ok(location) => location.load()?.manifest.provider,
        Err(e) => {
            tracing::debug!("No manifest, using environment only: {}", e);
            None
        }
    };
    let config = workspace::client_config(provider.as_ref())?;

    println!("{}", "Checking IBM Cloud credentials...".blue());
    println!("  Region: {}", config.region.cyan());
    println!("  IAM endpoint: {}", config.endpoints.iam.cyan());
    if let Some(resource_group) = &config.resource_group {
        println!("  Resource group: {}", resource_group.cyan());
    }

    let status = Session::new(config)?.check_auth().await;
    println!();
    if status.authenticated {
        println!("{}", "✓ Authenticated".green().bold());
        if let Some(info) = status.account_info {
            println!("  {}", info);
        }
        Ok(())
    } else {
        eprintln!("{}", "✗ Authentication failed".red().bold());
        anyhow::bail!(status.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}
