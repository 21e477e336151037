//! Validated job configuration and the output directory layout.
//!
//! [`JobConfig::from_args`] turns raw CLI/environment values into the
//! settings a job runs with. Any violation is reported as
//! [`BotError::Config`], which the lifecycle treats as fatal.

use crate::browser::LoadStrategy;
use crate::cli::ConfigArgs;
use crate::errors::{BotError, Result};
use crate::locators::dirs;
use crate::utils::{ensure_writable_dir, slugify_query};
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

/// Directory tree under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join(dirs::LOGS)
    }

    pub fn imgs(&self) -> PathBuf {
        self.root.join(dirs::IMGS)
    }

    pub fn excel(&self) -> PathBuf {
        self.root.join(dirs::EXCEL)
    }

    pub fn queue(&self) -> PathBuf {
        self.root.join(dirs::QUEUE)
    }

    /// Create every output directory and check that each is writable.
    pub fn create_all(&self) -> Result<()> {
        for dir in dirs::ALL {
            ensure_writable_dir(&self.root.join(dir))?;
        }
        Ok(())
    }
}

/// Settings for one job, read once at `Configuring`.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Slug form of the query; counted inside article links.
    pub query: String,
    pub url: Url,
    pub topic: Option<String>,
    pub months: u32,
    pub retry_max: usize,
    pub sheet_name: String,
    pub load_strategy: LoadStrategy,
    pub output: OutputLayout,
}

impl JobConfig {
    /// Validate the settings a crawl needs.
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let query = slugify_query(&args.query);
        if query.is_empty() {
            return Err(BotError::Config("query is empty".into()));
        }
        let url = Url::parse(&args.url)
            .map_err(|e| BotError::Config(format!("invalid url `{}`: {e}", args.url)))?;
        if args.retry_max == 0 {
            return Err(BotError::Config("retry ceiling must be at least 1".into()));
        }
        if args.sheet_name.trim().is_empty() {
            return Err(BotError::Config("sheet name is empty".into()));
        }
        let load_strategy = args.load_strategy.parse()?;

        let config = JobConfig {
            query,
            url,
            topic: args.topic.clone(),
            months: args.months,
            retry_max: args.retry_max,
            sheet_name: args.sheet_name.clone(),
            load_strategy,
            output: OutputLayout::new(&args.output_dir),
        };
        info!(
            query = %config.query,
            url = %config.url,
            topic = ?config.topic,
            months = config.months,
            retry_max = config.retry_max,
            "Variables and configs set up"
        );
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) fn test_args(query: &str, output: &Path) -> ConfigArgs {
    ConfigArgs {
        query: query.to_string(),
        url: "https://news.example.com/".to_string(),
        topic: None,
        months: 3,
        retry_max: 3,
        sheet_name: "data".to_string(),
        load_strategy: "normal".to_string(),
        output_dir: output.display().to_string(),
        headful: false,
    }
}
