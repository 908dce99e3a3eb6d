//! # tj-runner
//!
//! Main entry point for the trading-journal engine.
//!
//! Loads a JSON configuration file, starts the price aggregator for the
//! configured symbols, and runs until Ctrl+C. With `--trades` it instead
//! computes summary statistics over an exported trade list and exits.
//!
//! # Usage
//!
//! ```bash
//! tj-runner config.json --log-level info
//! tj-runner config.json --trades trades.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tj_core::types::TradeRecord;
use tj_feed::{PriceAggregator, PriceCallback};
use tj_journal::stats::{TradeStats, sort_by_entry_date};

/// Trading Journal Price Feed & Stats Runner.
#[derive(Parser)]
#[command(name = "tj-runner", about = "Trading Journal Price Feed & Stats Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Symbols to track, overriding the config's symbol lists.
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    /// Compute stats over an exported trade list (JSON array) and exit.
    #[arg(long)]
    trades: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = tj_core::config::load_config(&cli.config)?;
    tj_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), &config.module_name());

    if let Some(trades_path) = &cli.trades {
        return print_stats(trades_path);
    }

    let feed = config.effective_feed();
    let symbols = cli.symbols.unwrap_or_else(|| feed.all_symbols());
    if symbols.is_empty() {
        anyhow::bail!("no symbols configured — set feed.poll_symbols/feed.stream_symbols or pass --symbols");
    }

    info!("starting price feeds for {} symbol(s): {}", symbols.len(), symbols.join(", "));
    let aggregator = PriceAggregator::new(feed);
    aggregator.start_updates(&symbols);

    // Log every quote update while running.
    let on_update: PriceCallback = Arc::new(|snapshot| {
        for quote in snapshot.values() {
            info!(
                "{}: {:.2} ({:+.2}, {:+.2}%)",
                quote.symbol, quote.price, quote.change, quote.change_percent,
            );
        }
    });
    let _subscription = aggregator.subscribe(on_update);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    aggregator.stop_updates().await;
    info!("all feeds stopped — goodbye");
    Ok(())
}

/// Load a trade export, sort chronologically, print stats as JSON.
fn print_stats(path: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut trades: Vec<TradeRecord> =
        serde_json::from_str(&content).context("trade export is not a JSON array of trades")?;

    sort_by_entry_date(&mut trades);
    let stats = TradeStats::compute(&trades);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
