//! host_exporter binary
//!
//! Runs the collection engine and serves `/metrics` until interrupted.

use anyhow::Context;
use clap::{Parser, Subcommand};
use host_exporter::metrics::{catalog, exposition};
use host_exporter::{
    start_exporter, ExporterConfig, HostSource, Registry, Scheduler, ServiceTarget, SysinfoHost,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "host_exporter")]
#[command(about = "Host metrics exporter with a Prometheus-compatible /metrics endpoint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exposition server bind address
    #[arg(long)]
    host: Option<String>,

    /// Exposition server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Collection interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Service to probe as name=port (repeatable, replaces the default set)
    #[arg(short, long = "service", value_name = "NAME=PORT")]
    services: Vec<ServiceTarget>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect periodically and serve /metrics (default)
    Serve,

    /// Run a single collection cycle, print the exposition text and exit
    Once,

    /// Show host identity
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve_command(config).await,
        Commands::Once => once_command(config).await,
        Commands::Info => info_command().await,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to install logger")?;

    Ok(())
}

/// Defaults, then the config file, then flags.
fn load_config(cli: &Cli) -> anyhow::Result<ExporterConfig> {
    let mut config = match &cli.config {
        Some(path) => ExporterConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ExporterConfig::default(),
    };

    if let Some(host) = &cli.host {
        config = config.with_host(host.clone());
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(interval) = cli.interval {
        config = config.with_interval_secs(interval);
    }
    if !cli.services.is_empty() {
        config = config.with_services(cli.services.clone());
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn serve_command(config: ExporterConfig) -> anyhow::Result<()> {
    info!(
        bind = %config.bind_address(),
        interval = ?config.interval(),
        services = config.services.len(),
        "starting host_exporter"
    );

    start_exporter(config, SysinfoHost::new(), shutdown_signal())
        .await
        .context("exporter failed")?;

    Ok(())
}

async fn once_command(config: ExporterConfig) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::new());
    catalog::register_all(&registry, &config.services).context("failed to define metrics")?;

    let mut scheduler = Scheduler::from_config(SysinfoHost::new(), Arc::clone(&registry), &config);
    scheduler.publish_system_info().await;
    scheduler.run_cycle().await;

    let text = exposition::render(&registry).context("failed to encode metrics")?;
    print!("{}", text);
    Ok(())
}

async fn info_command() -> anyhow::Result<()> {
    let fields = tokio::task::spawn_blocking(|| SysinfoHost::new().system_info())
        .await
        .context("host inspection task failed")?
        .context("failed to read host identity")?;

    println!("host_exporter {}", env!("CARGO_PKG_VERSION"));
    for (key, value) in fields {
        println!("  {}: {}", key, value);
    }
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
