// ============================================
// File: crates/hostcmd-agent/src/main.rs
// ============================================
//! # hostcmd Agent Entry Point
//!
//! ## Creation Reason
//! Main entry point for the host command agent binary.
//! Handles CLI parsing, logging setup, and agent startup.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration and secret loading
//! - Agent execution and the `send` control-plane shortcut
//!
//! ## Usage
//! ```bash
//! hostcmd-agent start                  # Run the agent
//! hostcmd-agent send reboot            # Publish a signed command
//! hostcmd-agent validate               # Validate config file
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` overrides the configured log level
//! - Logging starts at `info` before the config is read, then switches to
//!   the configured level through a reload handle
//! - Exit code 1 on any error, including a transport failure while running
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation
//! v0.1.1 - Log configuration loading; print effective config on validate

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use hostcmd_agent::config::DEFAULT_CONFIG_PATH;
use hostcmd_agent::{Agent, AgentConfig, ControlPlane, Delivery};
use hostcmd_core::crypto::{load_secret, RunMode, SharedSecret};
use hostcmd_transport::RedisBus;

// ============================================
// CLI Definition
// ============================================

/// Signed host command agent
#[derive(Parser, Debug)]
#[command(name = "hostcmd-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the agent until Ctrl+C or a bus failure
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Sign and publish a host command
    Send {
        /// Command name (reboot, shutdown, set_ip_addresses)
        cmd: String,

        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log = init_logging("info");

    let result = match cli.command {
        Commands::Start { config } => cmd_start(config, &log).await,
        Commands::Send { cmd, config } => cmd_send(cmd, config, &log).await,
        Commands::Validate { config } => cmd_validate(config).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Runs the agent.
async fn cmd_start(config_path: PathBuf, log: &LogHandle) -> anyhow::Result<()> {
    let config = AgentConfig::resolve(&config_path).await?;
    set_log_level(log, &config.logging.level);

    info!("Starting hostcmd agent v{}", env!("CARGO_PKG_VERSION"));
    let secret = load_process_secret()?;

    let bus = Arc::new(RedisBus::connect(config.bus.endpoint()?).await?);
    let agent = Arc::new(Agent::from_config(&config, secret, bus)?);

    let signal_agent = Arc::clone(&agent);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_agent.shutdown();
        }
    });

    agent.run().await?;
    Ok(())
}

/// Publishes one signed command.
async fn cmd_send(cmd: String, config_path: PathBuf, log: &LogHandle) -> anyhow::Result<()> {
    let config = AgentConfig::resolve(&config_path).await?;
    set_log_level(log, &config.logging.level);

    let secret = load_process_secret()?;
    let bus = Arc::new(RedisBus::connect(config.bus.endpoint()?).await?);
    let plane = ControlPlane::from_config(&config, secret, bus)?;

    match plane.request(&cmd).await? {
        Delivery::Published { receivers } => {
            println!("Published '{cmd}' on '{}' ({receivers} receivers)", config.bus.channel);
        }
        Delivery::Supervisor(action) => {
            println!("Supervisor accepted '{action}'");
        }
    }
    Ok(())
}

/// Checks the configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Agent will use default values.");
    }

    let config = AgentConfig::resolve(&config_path).await?;
    let endpoint = config.bus.endpoint()?;

    println!("✅ Configuration is valid");
    println!();
    println!("Bus:");
    println!("   Redis:      {} (db {})", endpoint.addr(), endpoint.db);
    println!("   Channel:    {}", config.bus.channel);
    println!();
    println!("Security:");
    println!("   Max Age:    {}s", config.security.max_age_secs);
    println!("   Nonces:     {}", config.security.nonce_capacity);
    println!("   Cooldown:   {}s", config.limits.rate_limit_secs);
    println!();
    println!("Execution:");
    println!("   Backend:    {:?}", config.execution.backend);
    println!("   Dry Run:    {}", config.execution.dry_run);
    println!("   Timeout:    {}s", config.execution.timeout_secs);
    println!();
    println!("Effective configuration:");
    println!("{}", config.to_toml());

    Ok(())
}

// ============================================
// Helpers
// ============================================

type LogHandle = reload::Handle<EnvFilter, Registry>;

/// Initializes the tracing subscriber with a reloadable filter.
fn init_logging(level: &str) -> LogHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .ok();
    handle
}

/// Switches to the configured level unless `RUST_LOG` is set.
fn set_log_level(handle: &LogHandle, level: &str) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        error!(level, error = %e, "Failed to apply configured log level");
    }
}

/// Reads the signing secret according to `ENVIRONMENT`.
fn load_process_secret() -> anyhow::Result<Option<Arc<SharedSecret>>> {
    let mode = RunMode::from_env();
    info!(mode = %mode, "Loading signing secret");
    let secret = load_secret(mode, |key| std::env::var(key).ok())?;
    Ok(secret.map(Arc::new))
}
