mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod storage;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{AppConfig, StorageBackend, StorageConfig};
use crate::pipeline::Pipeline;
use crate::scraper::fetcher_from_config;
use crate::scraper::parsers::HtmlDocument;
use crate::scraper::tables::TableExtractor;
use crate::storage::{FlatFileStore, MarketStore, Repository};

#[derive(Parser)]
#[command(name = "ngx-grabber", about = "NGX market summary grabber", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the market summary page once and store all four tables
    Run,

    /// Fetch the page and print what would be extracted, storing nothing
    Capture {
        /// Also write the raw page markup here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run the extractors against a previously saved page
    Extract {
        /// Saved page markup
        file: PathBuf,
    },

    /// Show database statistics
    Stats,

    /// Apply schema migrations without fetching anything
    Migrate,
}

fn open_store(config: &StorageConfig) -> Result<Box<dyn MarketStore>> {
    match config.backend {
        StorageBackend::Duckdb => {
            let repo = Repository::open(&config.database_path())?;
            if config.run_migrations {
                repo.run_migrations()?;
            }
            Ok(Box::new(repo))
        }
        StorageBackend::FlatFile => Ok(Box::new(FlatFileStore::open(&config.data_dir)?)),
    }
}

fn print_extraction(extractor: &TableExtractor, doc: &HtmlDocument) -> Result<()> {
    let capture = extractor.extract_all(doc)?;
    println!("{}", serde_json::to_string_pretty(&capture)?);
    Ok(())
}

fn write_markup(path: &Path, markup: &str) -> Result<()> {
    std::fs::write(path, markup).with_context(|| format!("Could not write {:?}", path))?;
    info!("Page markup saved to {:?}", path);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "ngx_grabber=info,warn",
        1 => "ngx_grabber=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Run => {
            let store = open_store(&config.storage)?;
            let fetcher = fetcher_from_config(&config.scraper)?;
            let stats = Pipeline::new(&config, fetcher).run(store.as_ref()).await?;
            info!(
                "Done: capture {} | {} trades, {} advancers, {} decliners",
                stats.captured_at, stats.trades, stats.advancers, stats.decliners
            );
        }

        Command::Capture { out } => {
            let fetcher = fetcher_from_config(&config.scraper)?;
            let pipeline = Pipeline::new(&config, fetcher);
            let page = pipeline.capture().await?;
            info!("Captured page at {}", page.captured_at);
            if let Some(path) = out {
                write_markup(&path, &page.markup)?;
            }
            print_extraction(pipeline.extractor(), &page.document())?;
        }

        Command::Extract { file } => {
            let markup = std::fs::read_to_string(&file)
                .with_context(|| format!("Could not read {:?}", file))?;
            let extractor = TableExtractor::new(config.sections.clone(), config.extraction.row_policy);
            print_extraction(&extractor, &HtmlDocument::parse(&markup))?;
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.database_path())?;
            repo.run_migrations()?;
            let stats = repo.stats()?;
            println!("─────────────────────────────────");
            println!("  NGX Market Grabber — Database Stats");
            println!("─────────────────────────────────");
            println!("  Snapshots : {}", stats.snapshots);
            println!("  Trades    : {}", stats.trades);
            println!("  Advancers : {}", stats.advancers);
            println!("  Decliners : {}", stats.decliners);
            println!(
                "  Latest    : {}",
                stats.latest_capture.map(|d| d.to_string()).unwrap_or("—".into())
            );
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            Repository::open(&config.storage.database_path())?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
