//! # RPA News
//!
//! A robot that searches a news site for a query, walks the infinite-scroll
//! result listing newest-first, classifies each article and delivers it to a
//! spreadsheet, either directly or through a durable work-item queue.
//!
//! ## Features
//!
//! - Bounded retry with an in-place recovery action on every browser step
//! - Whole-job restart up to the retry ceiling, keeping the crawl position
//! - Resume walk back to the failed listing position after a page reload
//! - Date window, currency mention and query-in-link classification
//! - Best-effort image download per article
//!
//! ## Usage
//!
//! ```sh
//! rpa_news --query "climate change" --url https://www.aljazeera.com --months 2 run
//! rpa_news produce   # crawl into output/queue
//! rpa_news consume   # drain output/queue into a spreadsheet
//! ```
//!
//! Settings can also come from environment variables or a `config.env` file
//! in the working directory.
//!
//! ## Architecture
//!
//! 1. **Lifecycle** ([`lifecycle`]): configure, prepare, run, finish or restart
//! 2. **Workflow** ([`bot`]): search, sort, hand off to the crawler
//! 3. **Crawl** ([`crawler`], [`extract`]): positions, load-more, records
//! 4. **Delivery** ([`sink`]): spreadsheet or queue

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

mod assets;
mod bot;
mod browser;
mod cli;
mod config;
mod counter;
mod crawler;
mod errors;
mod extract;
mod lifecycle;
mod locators;
mod logging;
mod models;
mod retry;
mod sink;
mod utils;

use assets::HttpAssetFetcher;
use bot::NewsBot;
use browser::chrome::ChromeBrowser;
use cli::{Cli, Command, ConfigArgs};
use config::OutputLayout;
use lifecycle::Bot;
use sink::SinkMode;

fn main() -> Result<(), Box<dyn Error>> {
    let dotenv = dotenvy::from_filename("config.env");
    let cli = Cli::parse();

    // --- Tracing init ---
    let layout = OutputLayout::new(&cli.config.output_dir);
    let log_file = logging::init(&layout.logs())?;

    let start_time = Instant::now();
    info!(command = ?cli.command, log_file = %log_file.display(), "rpa_news starting up");
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) => debug!(error = %e, "No environment file loaded"),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = match cli.command {
        Command::Run => crawl(&cli.config, SinkMode::Direct, runtime.handle().clone()),
        Command::Produce => crawl(&cli.config, SinkMode::Queue, runtime.handle().clone()),
        Command::Consume => consume(&cli.config),
    };
    runtime.shutdown_timeout(Duration::from_secs(5));

    let elapsed = start_time.elapsed();
    match result {
        Ok(records) => {
            info!(
                records,
                elapsed_secs = elapsed.as_secs_f64(),
                "rpa_news finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, elapsed_secs = elapsed.as_secs_f64(), "rpa_news failed");
            Err(e.into())
        }
    }
}

/// Run the lifecycle for one query with the chosen delivery strategy.
fn crawl(args: &ConfigArgs, mode: SinkMode, runtime: Handle) -> errors::Result<usize> {
    let browser = ChromeBrowser::new(runtime.clone(), !args.headful);
    let assets = HttpAssetFetcher::new(runtime)?;
    let mut bot = NewsBot::new(args.clone(), mode, browser, assets);
    let report = bot.run()?;
    info!(state = %report.state, attempts = report.attempts, "Job report");
    Ok(report.records)
}

/// Drain the work queue into a spreadsheet named after this run.
fn consume(args: &ConfigArgs) -> errors::Result<usize> {
    let layout = OutputLayout::new(&args.output_dir);
    sink::consume(&layout, &args.sheet_name, Local::now().naive_local())
}
