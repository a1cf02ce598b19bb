//! assetlens
//!
//! Enriches Telegraf metrics with asset groups from an NSoT inventory,
//! caching lookups and invalidating them from the NSoT change feed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::{WrapErr, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use assetlens_api::SeedAttributes;
use assetlens_client::HttpGateway;
use assetlens_core::InventoryService;

mod config;
mod processor;

use config::Config;
use processor::{Metric, Processor};

#[derive(Parser)]
#[command(name = "assetlens")]
#[command(about = "Asset-aware metric enrichment backed by NSoT", long_about = None)]
struct Cli {
    /// Config file (defaults to $ASSETLENS_CONFIG or the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one IP address and print its asset
    Resolve {
        ip: String,
        /// Device name used if the asset has to be created
        #[arg(long)]
        name: Option<String>,
        /// IP version used if the asset has to be created
        #[arg(long)]
        ip_ver: Option<String>,
        /// Groups used if the asset has to be created
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// Enrich JSON metrics read line by line from stdin
    Process,
    /// Run one change-feed poll cycle and print the result
    Poll,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Config::find_path);
    let config = match &config_path {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    init_tracing(level);

    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file found, using defaults"),
    }

    let inventory = &config.inventory;
    let gateway = HttpGateway::with_timeout(&inventory.nsot, inventory.request_timeout())?
        .identity(&inventory.identity);
    let service = Arc::new(
        InventoryService::connect(inventory, Arc::new(gateway))
            .await
            .wrap_err_with(|| format!("failed to connect to {}", inventory.nsot))?,
    );

    let result = run(cli.command, &config, service.clone()).await;
    service.shutdown().await;
    result
}

async fn run(command: Commands, config: &Config, service: Arc<InventoryService>) -> Result<()> {
    match command {
        Commands::Resolve {
            ip,
            name,
            ip_ver,
            groups,
        } => {
            let mut seed = SeedAttributes::new();
            if let Some(name) = name {
                seed = seed.with_attribute("name", name);
            }
            if let Some(ip_ver) = ip_ver {
                seed = seed.with_attribute("ip_ver", ip_ver);
            }
            for group in groups {
                seed = seed.with_group(group);
            }

            let Some(asset) = service.resolve(&ip, &seed).await.into_asset() else {
                bail!("could not resolve {ip}");
            };
            println!("{}", serde_json::to_string_pretty(asset.as_ref())?);
        }
        Commands::Process => {
            let processor = Processor::new(service, config.inventory.tag.clone());
            process_stdin(&processor).await?;
        }
        Commands::Poll => {
            let outcome = service.poll_now().await;
            println!(
                "pages={} scanned={} removed={} checkpoint={} completed={}",
                outcome.pages, outcome.scanned, outcome.removed, outcome.checkpoint, outcome.completed
            );
            for ip in &outcome.invalidated {
                println!("invalidated {ip}");
            }
        }
    }

    Ok(())
}

/// Read metrics from stdin and write enriched metrics to stdout
///
/// Lines that are not valid metrics are forwarded untouched.
async fn process_stdin(processor: &Processor) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let metric: Metric = match serde_json::from_str(&line) {
            Ok(metric) => metric,
            Err(e) => {
                warn!(error = %e, "forwarding unparsable line");
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                continue;
            }
        };

        for enriched in processor.process(metric).await {
            let mut out = serde_json::to_vec(&enriched)?;
            out.push(b'\n');
            stdout.write_all(&out).await?;
        }
        stdout.flush().await?;
    }

    Ok(())
}

fn init_tracing(level: &str) {
    // stdout carries metrics, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
