use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docs_ipfs_archiver::config::Config;
use docs_ipfs_archiver::{archiver, extract, rewrite};

/// Archive links found in documentation to IPFS
#[derive(Parser, Debug)]
#[command(name = "docs-ipfs-archiver")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Stage,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Stage {
    /// Find links in changed documents and write the link records file
    Extract,
    /// Download and upload each link, writing the mapping records file
    Archive,
    /// Annotate documents with links to their archived copies
    Rewrite,
    /// Run extract, archive and rewrite in sequence
    Run,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_tracing()?;

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(stage = ?cli.command, "Starting docs-ipfs-archiver");

    match cli.command {
        Stage::Extract => {
            extract::run(&config).await?;
        }
        Stage::Archive => {
            archiver::run(&config).await?;
        }
        Stage::Rewrite => {
            rewrite::run(&config).await?;
        }
        Stage::Run => {
            let extracted = extract::run(&config).await?;
            let archived = archiver::run(&config).await?;
            let rewritten = rewrite::run(&config).await?;
            info!(
                links = extracted.links_found,
                archived = archived.archived,
                documents_updated = rewritten.documents_updated,
                "Pipeline complete"
            );
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,docs_ipfs_archiver=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for CI log collectors
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
