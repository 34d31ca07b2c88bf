//! rowbridge - expose a rowing machine as Bluetooth LE fitness sensors

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use rowbridge_cli::{run_bridge, AppConfig, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration
    let config = load_configuration(&cli)?;
    info!(
        "Starting rowbridge as '{}' with {:?} telemetry",
        config.device_name, config.source
    );

    if let Err(e) = run_bridge(config).await {
        error!("rowbridge failed: {}", e);
        return Err(e).context("rowbridge stopped with a fatal error");
    }

    info!("rowbridge exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults, then apply flags
fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    let base = if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        AppConfig::load_from_file(config_path)
            .with_context(|| format!("failed to load {}", config_path))?
    } else {
        AppConfig::default()
    };

    Ok(base.with_overrides(cli)?)
}
