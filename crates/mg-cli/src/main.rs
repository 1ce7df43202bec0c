//! meshgate CLI
//!
//! - Browse networks, devices and relays
//! - Show or set a network's exit node
//! - `up`: register this device, assign the exit node and hold the tunnel

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meshgate::commands;
use mg_core::config::{self, ClientConfig};
use mg_core::types::{ExitNodeSelection, NetworkId};

#[derive(Parser)]
#[command(name = "meshgate")]
#[command(author, version, about = "Mesh VPN client")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API token (overrides the config file)
    #[arg(long, global = true, env = "MESHGATE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Mesh API base URL (overrides the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List mesh networks
    Networks {
        #[arg(long)]
        json: bool,
    },

    /// List the devices of a network
    Devices {
        /// Network ID
        network: String,
        #[arg(long)]
        json: bool,
    },

    /// List exit relays
    Relays {
        #[arg(long)]
        json: bool,
    },

    /// Show or change a network's exit node
    ExitNode {
        #[command(subcommand)]
        action: ExitNodeAction,
    },

    /// Connect to a network and keep the tunnel up until Ctrl+C
    /// Alias: connect
    #[command(alias = "connect")]
    Up {
        /// Network ID
        #[arg(short, long)]
        network: String,
        /// Exit node: none, relay:<id> or device:<id>
        #[arg(short, long, default_value = "none")]
        exit: ExitNodeSelection,
    },

    /// Ask the local tunnel runner whether the tunnel is up
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ExitNodeAction {
    /// Show the current exit node
    Get { network: String },
    /// Set the exit node: none, relay:<id> or device:<id>
    Set {
        network: String,
        selection: ExitNodeSelection,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Set a config value
    Set { key: String, value: String },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Commands::Config { action } = &cli.command {
        let path = cli.config.as_ref();
        match action {
            ConfigAction::Show => commands::config_show(path)?,
            ConfigAction::Init { force } => commands::config_init(path, *force)?,
            ConfigAction::Set { key, value } => commands::config_set(path, key, value)?,
            ConfigAction::Path => commands::config_path(path),
        }
        return Ok(());
    }

    let config = load_client_config(&cli)?;

    match cli.command {
        Commands::Networks { json } => {
            let backend = commands::backend_from_config(&config)?;
            commands::networks_command(&backend, json).await?;
        }

        Commands::Devices { network, json } => {
            let backend = commands::backend_from_config(&config)?;
            commands::devices_command(&backend, &NetworkId::new(network), &config.device_name(), json)
                .await?;
        }

        Commands::Relays { json } => {
            let backend = commands::backend_from_config(&config)?;
            commands::relays_command(&backend, json).await?;
        }

        Commands::ExitNode { action } => {
            let backend = commands::backend_from_config(&config)?;
            match action {
                ExitNodeAction::Get { network } => {
                    commands::exit_node_get(&backend, &NetworkId::new(network)).await?;
                }
                ExitNodeAction::Set { network, selection } => {
                    commands::exit_node_set(&backend, &NetworkId::new(network), &selection).await?;
                }
            }
        }

        Commands::Up { network, exit } => {
            let backend = commands::backend_from_config(&config)?;
            commands::up_command(&config, backend, NetworkId::new(network), exit).await?;
        }

        Commands::Status => {
            commands::status_command(&config).await?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Config file (or defaults) with command-line overrides applied
fn load_client_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config: ClientConfig = config::load_config_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(token) = &cli.token {
        config.api_token = Some(token.clone());
    }
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }

    Ok(config)
}
