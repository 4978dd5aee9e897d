//! Canopy Daemon - The naming service process.
//!
//! Runs the two HTTP listeners of the naming service:
//! - the service endpoint for client requests
//! - the registration endpoint for storage replicas
//!
//! Invocation: `canopyd <SERVICE_PORT> <REGISTRATION_PORT>`, optionally
//! with a TOML config file whose values the CLI ports override.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::DEFAULT_REPLICATION_THRESHOLD;
use canopy_naming::{NamingConfig, NamingService};
use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Canopy naming service daemon.
#[derive(Parser)]
#[command(name = "canopyd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port for client service requests
    service_port: u16,

    /// Port for storage replica registration
    registration_port: u16,

    /// Address to bind both listeners on
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Daemon configuration beyond the listener addresses.
#[derive(Debug, Clone)]
struct DaemonConfig {
    replication_threshold: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            replication_threshold: DEFAULT_REPLICATION_THRESHOLD,
        }
    }
}

/// Load configuration from a TOML file.
fn load_config(path: &PathBuf) -> Result<DaemonConfig> {
    let content = std::fs::read_to_string(path).context("Failed to read config file")?;
    let toml: toml::Value = content.parse().context("Failed to parse config file")?;

    let mut config = DaemonConfig::default();

    if let Some(replication) = toml.get("replication") {
        if let Some(threshold) = replication.get("threshold").and_then(|v| v.as_integer()) {
            config.replication_threshold = threshold as u32;
        }
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DaemonConfig::default(),
    };

    let naming_config = NamingConfig {
        service_addr: SocketAddr::new(cli.bind, cli.service_port),
        registration_addr: SocketAddr::new(cli.bind, cli.registration_port),
        replication_threshold: config.replication_threshold,
    };

    info!("Starting Canopy naming service");
    let running = NamingService::with_http_commands(naming_config)
        .serve()
        .await
        .context("Failed to bind listeners")?;

    println!("Canopy naming service running");
    println!("  Service:      {}", running.service_addr);
    println!("  Registration: {}", running.registration_addr);
    println!();
    println!("Press Ctrl+C to stop");

    signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");
    running.shutdown();
    info!("Daemon stopped");

    Ok(())
}
