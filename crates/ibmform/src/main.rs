mod commands;
mod output;
mod workspace;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ibmform")]
#[command(about = "Declarative IBM Cloud provisioning from KDL manifests", long_about = None)]
struct Cli {
    /// Manifest file (default: main.kdl or ibmform.kdl in the current directory)
    #[arg(short, long, global = true, env = "IBMFORM_CONFIG")]
    file: Option<PathBuf>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the manifest against resource schemas without calling any API
    Validate,
    /// Show the changes apply would make
    Plan {
        /// Skip re-reading resources already in state
        #[arg(long)]
        no_refresh: bool,
    },
    /// Create, update and delete resources to match the manifest
    Apply {
        /// Apply without asking for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
        /// Skip re-reading resources already in state
        #[arg(long)]
        no_refresh: bool,
    },
    /// Delete every resource in state
    Destroy {
        /// Destroy without asking for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Bring an existing object under management
    Import {
        /// Resource address declared in the manifest (e.g. ibm_is_vpc.main)
        address: String,
        /// Remote id, in the layout the resource type expects
        id: String,
    },
    /// Inspect the state file
    #[command(subcommand)]
    State(StateCommands),
    /// Print resource and data source schemas as JSON
    Schema {
        /// Only this resource or data source type
        resource_type: Option<String>,
    },
    /// List supported resource and data source types
    Providers,
    /// Check IBM Cloud credentials
    Auth,
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List managed resources
    List,
    /// Show one managed resource
    Show {
        /// Resource address (e.g. ibm_is_vpc.main)
        address: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // commands that need no manifest
    match &cli.command {
        Commands::Version => {
            println!("ibmform {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Providers => return commands::providers::handle(),
        Commands::Schema { resource_type } => {
            return commands::schema::handle(resource_type.as_deref());
        }
        Commands::Auth => return commands::auth::handle(cli.file.as_deref()).await,
        _ => {}
    }

    let location = workspace::Location::find(cli.file.as_deref())?;
    tracing::debug!("Using manifest {}", location.manifest_path.display());

    match cli.command {
        Commands::Validate => commands::validate::handle(&location.load()?),
        Commands::Plan { no_refresh } => commands::plan::handle(&location.load()?, !no_refresh).await,
        Commands::Apply { yes, no_refresh } => {
            commands::apply::handle(&location.load()?, yes, !no_refresh).await
        }
        Commands::Destroy { yes } => commands::destroy::handle(&location.load()?, yes).await,
        Commands::Import { address, id } => {
            commands::import::handle(&location.load()?, &address, &id).await
        }
        Commands::State(StateCommands::List) => commands::state::list(&location).await,
        Commands::State(StateCommands::Show { address, format }) => {
            commands::state::show(&location, &address, format).await
        }
        Commands::Version | Commands::Providers | Commands::Schema { .. } | Commands::Auth => Ok(()),
    }
}
