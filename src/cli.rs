//! Command-line interface definitions for the news bot.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Every job setting can be provided via a command-line flag or an
//! environment variable (which `main` may have loaded from `config.env`).

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the news bot.
///
/// # Examples
///
/// ```sh
/// # Crawl and write the spreadsheet directly
/// rpa_news --query "climate change" --url https://www.aljazeera.com --months 2 run
///
/// # Split pipeline: crawl into the work queue, then drain it into a sheet
/// rpa_news --query economy --url https://www.aljazeera.com produce
/// rpa_news consume
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Job settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Search phrase; slugified before use
    #[arg(long, env = "QUERY", default_value = "", global = true)]
    pub query: String,

    /// Home page of the news site
    #[arg(long, env = "URL", default_value = "", global = true)]
    pub url: String,

    /// Topic label, recorded in the logs only
    #[arg(long, env = "TOPIC", global = true)]
    pub topic: Option<String>,

    /// Month window; 0 and 1 both mean the current month only
    #[arg(long, env = "MONTHS", default_value_t = 1, global = true)]
    pub months: u32,

    /// Attempts per step, and whole-job attempts before giving up
    #[arg(long, env = "RETRY_MAX", default_value_t = 5, global = true)]
    pub retry_max: usize,

    /// Worksheet name inside the workbook
    #[arg(long, env = "SHEET_NAME", default_value = "data", global = true)]
    pub sheet_name: String,

    /// Page load strategy: normal, eager or none
    #[arg(long, env = "LOAD_STRATEGY", default_value = "normal", global = true)]
    pub load_strategy: String,

    /// Root of the logs/, imgs/, excel/ and queue/ directories
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "output", global = true)]
    pub output_dir: String,

    /// Show the browser window instead of running headless
    #[arg(long, env = "HEADFUL", global = true)]
    pub headful: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Crawl the feed and append each record to the spreadsheet
    Run,
    /// Crawl the feed and push each record to the work queue
    Produce,
    /// Drain the work queue into a new spreadsheet
    Consume,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "rpa_news",
            "--query",
            "climate change",
            "--url",
            "https://www.aljazeera.com",
            "--months",
            "3",
            "run",
        ]);

        assert_eq!(cli.command, Command::Run);
        assert_eq!(cli.config.query, "climate change");
        assert_eq!(cli.config.months, 3);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["rpa_news", "consume"]);

        assert_eq!(cli.command, Command::Consume);
        assert_eq!(cli.config.retry_max, 5);
        assert_eq!(cli.config.sheet_name, "data");
        assert_eq!(cli.config.load_strategy, "normal");
        assert!(!cli.config.headful);
    }

    #[test]
    fn test_cli_flags_after_subcommand() {
        let cli = Cli::parse_from(["rpa_news", "produce", "-o", "/tmp/out", "--retry-max", "2"]);

        assert_eq!(cli.command, Command::Produce);
        assert_eq!(cli.config.output_dir, "/tmp/out");
        assert_eq!(cli.config.retry_max, 2);
    }
}
