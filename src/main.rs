use anyhow::{bail, Context};
use clap::Parser;
use mape::bootstrap::DeclarativeConfig;
use mape::cli::{Cli, Commands};
use mape::config::AppConfig;
use mape::coordinator::{CoordinatorBuilder, DiscoveryHandle};
use mape::logging::{init_logging, init_logging_simple};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { bootstrap } => run(&cli.config_dir, bootstrap.clone()).await,
        Commands::Check { bootstrap } => {
            init_logging_simple();
            check(bootstrap)
        }
    }
}

async fn run(config_dir: &Path, bootstrap: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load_from(config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
    let _guard = init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Invalid configuration: {}", e);
        }
        bail!("{} configuration errors", errors.len());
    }

    let coordinator = CoordinatorBuilder::from_config(&config).build().await;

    if let Some(path) = bootstrap.or_else(|| config.bootstrap.path.clone()) {
        let declarative = DeclarativeConfig::from_file(&path)
            .with_context(|| format!("reading bootstrap file {}", path.display()))?;
        declarative
            .apply(&coordinator, config.metrics.default_poll_interval())
            .await;
    }

    // agents get clones of the handle; the loop ends when all are dropped
    let (_discovery, discovery_rx) = DiscoveryHandle::channel(config.discovery.channel_capacity);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let control_loop = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(discovery_rx, shutdown_rx).await })
    };

    info!("mape running, press Ctrl-C to stop");
    signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(());
    control_loop.await.context("coordinator task failed")?;
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let declarative = DeclarativeConfig::from_file(path)
        .with_context(|| format!("reading bootstrap file {}", path.display()))?;

    let problems = declarative.check();
    if problems.is_empty() {
        println!(
            "{}: {} rules, {} resources, {} metrics, sla: {}",
            path.display(),
            declarative.rules.len(),
            declarative.resources.len(),
            declarative.metrics.len(),
            declarative.sla.as_ref().map_or("none", |s| s.name.as_str())
        );
        return Ok(());
    }

    for problem in &problems {
        eprintln!("{}", problem);
    }
    bail!("{} invalid entries in {}", problems.len(), path.display())
}
