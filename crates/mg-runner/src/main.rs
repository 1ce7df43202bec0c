//! meshgate tunnel runner
//!
//! Launched by the orchestrator process with a fresh control token in the
//! state directory. Reads the bridged configuration on `Start`, drives the
//! tunnel engine, and exits on Ctrl+C or when the orchestrator kills it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mg_core::config::{self, BridgeBackend, RunnerConfig};
use mg_core::{control_auth, SecretBridge};
use mg_runner::{ControlServer, DryRunEngine, TunnelAdapter};

#[derive(Parser)]
#[command(name = "mg-runner")]
#[command(about = "meshgate tunnel runner - started by the meshgate client")]
#[command(version)]
struct Args {
    /// Localhost port for the control socket
    #[arg(long)]
    control_port: Option<u16>,

    /// Directory holding the control token and the file bridge
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Secret bridge backend (file, keyring)
    #[arg(long)]
    bridge: Option<BridgeBackend>,

    /// Tunnel interface name
    #[arg(long, default_value = "mg0")]
    interface: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.foreground {
        "debug"
    } else {
        args.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config::default_config_dir().join("runner.toml"));

    let mut config: RunnerConfig = if config_path.exists() {
        config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RunnerConfig::default()
    };

    if let Some(port) = args.control_port {
        config.control_port = port;
    }
    if let Some(state_dir) = args.state_dir {
        config.state_dir = state_dir;
    }
    if let Some(bridge) = args.bridge {
        config.bridge = bridge;
    }

    tracing::info!("meshgate tunnel runner starting (bridge: {})", config.bridge);

    let token = control_auth::read_token(&config.state_dir).with_context(|| {
        format!(
            "No control token in {}; the runner is started by the meshgate client",
            config.state_dir.display()
        )
    })?;

    let bridge = SecretBridge::for_installation(config.bridge, &config.state_dir);
    let engine = Arc::new(DryRunEngine::new(args.interface));
    let adapter = Arc::new(TunnelAdapter::new(bridge, engine));

    let server = ControlServer::bind(&config.control_address(), Arc::clone(&adapter), token).await?;
    let shutdown = server.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Interrupted");
        shutdown.cancel();
    });

    server.run().await?;

    adapter.stop().await;
    tracing::info!("meshgate tunnel runner stopped");
    Ok(())
}
