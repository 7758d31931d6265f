//! inventory-sync command line entry point
//!
//! ```text
//! inventory-sync [--delay=<seconds>] [--categories=<a,b>] [--config=<path>]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use inventory_sync_lib::application::{SyncCoordinator, SyncSettings};
use inventory_sync_lib::domain::HeartbeatReporter;
use inventory_sync_lib::infrastructure::config::{AppConfig, MonitoringConfig};
use inventory_sync_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use inventory_sync_lib::infrastructure::{BanknoteCatalog, HttpHeartbeat, RuleBasedNormalizer};

#[derive(Parser, Debug)]
#[command(name = "inventory-sync", version, about = "Synchronize the shop catalog into versioned local snapshots")]
struct Cli {
    /// Pause between index pages and detail fetches, in seconds
    #[arg(long)]
    delay: Option<u64>,

    /// Comma-separated categories to sync (default: every registered category)
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Configuration file (TOML/JSON/YAML)
    #[arg(long, env = "INVENTORY_SYNC_CONFIG")]
    config: Option<PathBuf>,
}

fn heartbeat_for(monitoring: &MonitoringConfig) -> HttpHeartbeat {
    HttpHeartbeat::from_url_file(monitoring.heartbeat_url_file.as_deref(), monitoring.report_success)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            heartbeat_for(&MonitoringConfig::default()).report_failure().await;
            return ExitCode::FAILURE;
        }
    };
    if let Some(delay) = cli.delay {
        config.sync.delay_seconds = delay;
    }

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }
    log_system_info();

    let heartbeat = heartbeat_for(&config.monitoring);
    match run(&cli, &config).await {
        Ok(()) => {
            heartbeat.report_success().await;
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {:#}", e);
            heartbeat.report_failure().await;
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let registry = config.category_registry();
    // Reject unknown names before any network or filesystem work
    let selected = registry.resolve(&cli.categories)?;
    info!(
        "🚀 Syncing {} (delay {}s)",
        selected.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
        config.sync.delay_seconds
    );

    let catalog = BanknoteCatalog::connect(&config.remote)
        .await
        .context("Failed to initialize the shop session")?;
    let normalizer = RuleBasedNormalizer::banknote_defaults().context("Invalid normalization rules")?;

    let coordinator = SyncCoordinator::new(
        SyncSettings::from_app_config(config),
        registry,
        Arc::new(catalog),
        Arc::new(normalizer),
    );
    let report = coordinator.run(&cli.categories).await?;

    for category in &report.categories {
        info!(
            "[{}] {} listed, {} normalized, {} fetched, {} delisted, {} failed",
            category.category,
            category.listed,
            category.normalized,
            category.fetched,
            category.delisted,
            category.failed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_categories_are_comma_separated() {
        let cli = Cli::try_parse_from(["inventory-sync", "--delay=0", "--categories=laptops,monitors"]).unwrap();
        assert_eq!(cli.delay, Some(0));
        assert_eq!(cli.categories, vec!["laptops", "monitors"]);

        let cli = Cli::try_parse_from(["inventory-sync"]).unwrap();
        assert!(cli.categories.is_empty());
        assert_eq!(cli.delay, None);
    }
}
