use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use forest::config::ForestConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "forest")]
#[command(version, about = "Command-line client for the Forest fleet backend")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Backend `host:port` (overrides FOREST_HOST and forest.toml)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Shared secret sent in the `token` header (overrides FOREST_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Path to a forest.toml. Defaults to .forest/forest.toml in the project dir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List leaves with their state
    Leaves,
    /// Flip a leaf between active and inactive
    Toggle { name: String },
    /// Move a leaf to another branch
    Migrate { name: String, destination: String },
    /// List branches a leaf may migrate to
    Targets { name: String },
    /// List branches
    Branches,
    /// List leaf species
    Species,
    /// Show the settings template for a new leaf of a species
    Defaults { species: String },
    /// Show the servers the backend reports on
    Status,
    /// Create a leaf
    Create {
        name: String,
        /// Species id
        species: String,
        /// Addresses the leaf serves
        #[arg(required = true)]
        address: Vec<String>,
        /// Branch ids to deploy to (repeatable)
        #[arg(long)]
        branch: Vec<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Species-specific settings as JSON
        #[arg(long)]
        settings: Option<String>,
    },
    /// Show a leaf's logs
    Logs {
        leaf_id: String,
        /// Also fetch this many older pages
        #[arg(long, default_value = "0")]
        older: usize,
        /// Read through the /api resource endpoints instead of the command channel
        #[arg(long)]
        rest: bool,
    },
    /// Show a branch's logs
    BranchLogs { name: String },
    /// Show or replace a leaf's settings
    Settings {
        leaf_id: String,
        /// New settings as JSON: `{"common": {...}, "custom": {...}}`
        #[arg(long)]
        set: Option<String>,
        /// Use the /api resource endpoints instead of the command channel
        #[arg(long)]
        rest: bool,
    },
    /// Authenticate against the backend
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Send an arbitrary command: `forest call get_leaves` or `forest call toggle_leaf name=main`
    Call {
        function: String,
        args: Vec<String>,
        /// Send over the live socket instead of HTTP
        #[arg(long)]
        socket: bool,
    },
    /// Interactive console over the live socket
    Console,
    /// Follow the live socket and re-list leaves on every pushed event
    Watch,
    /// View, validate, or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default forest.toml file
    Init,
}

fn init_tracing(verbose: bool) {
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
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = ForestConfig::load(project_dir.clone(), cli.config.clone())?
        .with_cli_args(cli.host.clone(), cli.token.clone());
    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }

    match &cli.command {
        Commands::Leaves => cmd::cmd_leaves(&config).await?,
        Commands::Toggle { name } => cmd::cmd_toggle(&config, name).await?,
        Commands::Migrate { name, destination } => {
            cmd::cmd_migrate(&config, name, destination).await?
        }
        Commands::Targets { name } => cmd::cmd_targets(&config, name).await?,
        Commands::Branches => cmd::cmd_branches(&config).await?,
        Commands::Species => cmd::cmd_species(&config).await?,
        Commands::Defaults { species } => cmd::cmd_defaults(&config, species).await?,
        Commands::Status => cmd::cmd_status(&config).await?,
        Commands::Create {
            name,
            species,
            address,
            branch,
            desc,
            settings,
        } => {
            cmd::cmd_create(
                &config,
                cmd::fleet::CreateArgs {
                    name,
                    species,
                    address,
                    branch,
                    desc: desc.as_deref(),
                    settings: settings.as_deref(),
                },
            )
            .await?
        }
        Commands::Logs {
            leaf_id,
            older,
            rest,
        } => cmd::cmd_logs(&config, leaf_id, *older, *rest).await?,
        Commands::BranchLogs { name } => cmd::cmd_branch_logs(&config, name).await?,
        Commands::Settings { leaf_id, set, rest } => {
            cmd::cmd_settings(&config, leaf_id, set.as_deref(), *rest).await?
        }
        Commands::Login { username, password } => {
            cmd::cmd_login(&config, username, password).await?
        }
        Commands::Call {
            function,
            args,
            socket,
        } => cmd::cmd_call(&config, function, args, *socket).await?,
        Commands::Console => cmd::cmd_console(&config).await?,
        Commands::Watch => cmd::cmd_watch(&config).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, &config, command.clone())?,
    }

    Ok(())
}
