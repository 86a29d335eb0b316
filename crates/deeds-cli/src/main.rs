//! `deeds` - scrape deed records from a county registry search.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use deeds_core::{parse_iso_date, AppConfig, DeedsError, DocTypeCode};
use deeds_scanner::{parse_row, GridLayout, HttpFetcher, ResultParser, SearchOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

mod output;

#[derive(Parser)]
#[command(
    name = "deeds",
    about = "Scrape deed records from a county registry search",
    version
)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search and write every record as JSON Lines
    Scrape {
        /// Config file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// First recording date, YYYY-MM-DD
        #[arg(long, value_parser = parse_iso_date)]
        start_date: Option<NaiveDate>,
        /// Last recording date, YYYY-MM-DD
        #[arg(long, value_parser = parse_iso_date)]
        end_date: Option<NaiveDate>,
        /// Registry document type code
        #[arg(long, value_parser = parse_doc_type)]
        doc_type: Option<DocTypeCode>,
        /// Search page URL
        #[arg(long)]
        url: Option<String>,
        /// Write records here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Result pages fetched at the same time
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Parse a saved result page and print its records
    ParsePage {
        /// HTML file saved from the registry
        html_file: PathBuf,
        /// Config file whose `[grid]` section describes the results table
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Config file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_doc_type(value: &str) -> Result<DocTypeCode, DeedsError> {
    DocTypeCode::new(value)
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if quiet {
        "warn"
    } else if verbose {
        "info,deeds=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Scrape {
            config,
            start_date,
            end_date,
            doc_type,
            url,
            output,
            concurrency,
        } => {
            let mut config = AppConfig::load_with_env(config.as_deref())?;
            if let Some(date) = start_date {
                config.search.start_date = date;
            }
            if let Some(date) = end_date {
                config.search.end_date = date;
            }
            if let Some(code) = doc_type {
                config.search.doc_type_code = code;
            }
            if let Some(url) = url {
                config.search.url = url;
            }
            if let Some(path) = output {
                config.output.path = Some(path);
            }
            if let Some(concurrency) = concurrency {
                config.http.max_concurrent_pages = concurrency;
            }
            scrape(&config).await
        }
        Commands::ParsePage { html_file, config } => {
            let config = AppConfig::load_with_env(config.as_deref())?;
            parse_page(&html_file, &config.grid)
        }
        Commands::Config { config } => {
            let config = AppConfig::load_with_env(config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn scrape(config: &AppConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    info!("Starting deeds v{}", env!("CARGO_PKG_VERSION"));

    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let orchestrator = SearchOrchestrator::from_config(fetcher, config)?;
    let mut writer = output::open(config.output.path.as_deref())?;

    let (tx, mut rx) = mpsc::channel(64);
    let write_all = async {
        while let Some(record) = rx.recv().await {
            if let Err(e) = writer.write_record(&record) {
                // Closing the channel stops the run at its next send.
                rx.close();
                return Err(e);
            }
        }
        Ok(())
    };

    let (summary, written) = tokio::join!(orchestrator.run(tx), write_all);
    written?;
    let summary = summary?;
    let count = writer.finish()?;

    info!("Wrote {} records", count);
    if !summary.is_complete() {
        bail!(
            "run {} incomplete: pages {:?} failed",
            summary.run_id,
            summary.pages_failed
        );
    }
    Ok(())
}

fn parse_page(path: &Path, layout: &GridLayout) -> Result<()> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let parser = ResultParser::new(layout)?;
    let mut writer = output::open(None)?;

    for (index, row) in parser.parse_rows(&html)?.into_iter().enumerate() {
        match row.and_then(|cells| parse_row(&cells)) {
            Ok(record) => writer.write_record(&record)?,
            Err(e) => tracing::warn!(row = index, "Skipping row: {}", e),
        }
    }

    writer.finish()?;
    Ok(())
}
