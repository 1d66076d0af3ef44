//! scholarcsv - Google Scholar search via SerpAPI, saved as CSV
//!
//! ## Usage
//!
//! ### One-shot
//! ```bash
//! SERPAPI_KEY=... scholarcsv "machine learning" --num 20
//! ```
//!
//! ### Interactive
//! ```bash
//! SERPAPI_KEY=... scholarcsv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use scholarcsv::{
    config::{Config, ConfigOverrides},
    pipeline,
    serpapi::SerpApiClient,
    writer::ResultWriter,
    ScholarError,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar search via SerpAPI, saved as CSV
#[derive(Parser)]
#[command(name = "scholarcsv")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Search keywords (prompted for interactively when omitted)
    query: Option<String>,

    /// Number of results to request
    #[arg(short, long)]
    num: Option<u32>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Search endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Retries after a network failure (default: none)
    #[arg(long)]
    retries: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = load_config(&cli)?;
    debug!(config = ?config, "Configuration loaded");

    let client = SerpApiClient::from_config(&config)?;
    let writer = ResultWriter::new(&config.output_dir);

    match cli.query {
        Some(query) => run_once(&config, &client, &writer, &query).await,
        None => run_interactive(&config, &client, &writer).await,
    }
}

/// Environment first, then command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let overrides = ConfigOverrides {
        result_count: cli.num,
        output_dir: cli.output.clone(),
        endpoint: cli.endpoint.clone(),
        retries: cli.retries,
    };
    Ok(Config::from_env()?.apply_overrides(&overrides)?)
}

// ============================================================================
// Search Runs
// ============================================================================

async fn run_once(
    config: &Config,
    client: &SerpApiClient,
    writer: &ResultWriter,
    query: &str,
) -> Result<()> {
    println!("Fetching Google Scholar results...");

    let report = pipeline::run(config, client, writer, query)
        .await
        .with_context(|| format!("Search for '{}' failed", query.trim()))?;

    println!("Fetched {} Google Scholar results.", report.rows);
    println!("Results saved to {}", report.path.display());
    Ok(())
}

/// Prompt for queries until `exit` or end of input
async fn run_interactive(
    config: &Config,
    client: &SerpApiClient,
    writer: &ResultWriter,
) -> Result<()> {
    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("Enter search keyword (or type 'exit' to quit): ");
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        let query = input.trim();
        if query.eq_ignore_ascii_case("exit") {
            println!("Exiting.");
            break;
        }
        if query.is_empty() {
            println!("Query is empty. Please enter a valid search keyword.");
            continue;
        }

        match run_once(config, client, writer, query).await {
            Err(e)
                if e
                    .downcast_ref::<ScholarError>()
                    .is_some_and(ScholarError::is_name_collision) =>
            {
                println!("{:#}", e);
                println!("A file for this query was just written; wait a second and try again.");
            }
            other => other?,
        }
    }

    Ok(())
}
